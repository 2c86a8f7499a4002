use strum_macros::Display;

/// Whether the controller has placed this extension on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum DeviceState {
    #[default]
    #[strum(to_string = "offline")]
    Offline,
    #[strum(to_string = "online")]
    Online,
}

/// Whether the controller has acknowledged this extension's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum Identity {
    #[default]
    #[strum(to_string = "orphaned")]
    Orphaned,
    #[strum(to_string = "identified")]
    Identified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum Muting {
    #[default]
    #[strum(to_string = "audible")]
    Audible,
    #[strum(to_string = "muted")]
    Muted,
}

/// Lifecycle of one extension.
///
/// The three axes are independent: a controller can mute an online,
/// orphaned extension or identify an offline one. Startup announcements live
/// in [`crate::liveness::Liveness`], update state in
/// [`crate::firmware::UpdatePhase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Lifecycle {
    state: DeviceState,
    identity: Identity,
    muting: Muting,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn muting(&self) -> Muting {
        self.muting
    }

    pub fn is_online(&self) -> bool {
        self.state == DeviceState::Online
    }

    pub fn is_identified(&self) -> bool {
        self.identity == Identity::Identified
    }

    pub fn is_muted(&self) -> bool {
        self.muting == Muting::Muted
    }

    /// Controller acknowledged us directly.
    pub fn identify(&mut self) {
        self.identity = Identity::Identified;
        self.muting = Muting::Audible;
    }

    /// `extension_offline` / `park_extension`: forget the identity and speak up again.
    pub fn park(&mut self) {
        self.identity = Identity::Orphaned;
        self.muting = Muting::Audible;
    }

    pub fn mute(&mut self) {
        self.muting = Muting::Muted;
    }

    pub fn unmute(&mut self) {
        self.muting = Muting::Audible;
    }

    pub fn go_online(&mut self) {
        self.state = DeviceState::Online;
    }
}
