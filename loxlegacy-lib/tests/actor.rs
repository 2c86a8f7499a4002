//! Tests for the serialized event loop

mod common;

use bytes::Bytes;
use common::*;
use loxlegacy_lib::actor;

#[tokio::test(start_paused = true)]
async fn test_frames_and_ticks_share_one_owner() {
    let (handle, task) = actor::spawn(extension());
    handle.receive(unicast(LegacyCommand::Identify, 0, 0, 0)).await.unwrap();
    handle.receive(unicast(LegacyCommand::Alive, 0, 0, 0)).await.unwrap();
    handle.shutdown().await.unwrap();

    let ext = task.join().await.unwrap();
    assert!(ext.is_identified());
    let commands = sent_commands(&ext);
    assert_eq!(commands.first(), Some(&LegacyCommand::StartRequest));
    assert!(commands.contains(&LegacyCommand::AliveReply));
}

#[tokio::test(start_paused = true)]
async fn test_fragmented_send_through_handle() {
    let (handle, task) = actor::spawn(extension());

    let refused = handle
        .send_fragmented(FragmentCommand::Other(0x10), Bytes::from_static(&[1, 2, 3]))
        .await;
    assert!(matches!(refused, Err(LegacyError::NotOnline)));

    handle.receive(unicast(LegacyCommand::LedFlashPosition, 0, 0, 0)).await.unwrap();
    let sent = handle
        .send_fragmented(FragmentCommand::Other(0x10), Bytes::from(vec![7u8; 12]))
        .await
        .unwrap();
    assert_eq!(sent, 3);

    handle.shutdown().await.unwrap();
    let ext = task.join().await.unwrap();
    let fragments = ext
        .transport()
        .sent
        .iter()
        .filter(|f| f.command() == LegacyCommand::FragmentedPackage)
        .count();
    assert_eq!(fragments, 3);
}

#[tokio::test(start_paused = true)]
async fn test_reset_stops_the_loop() {
    let (handle, task) = actor::spawn(extension());
    handle
        .receive(broadcast_type(LegacyCommand::RebootAll, 0, 0xDEAD, FIRMWARE_VERSION))
        .await
        .unwrap();

    let ext = task.join().await.unwrap();
    assert!(ext.is_halted());
    assert_eq!(ext.reset_line().resets, 1);
    assert!(matches!(
        handle.receive(unicast(LegacyCommand::Alive, 0, 0, 0)).await,
        Err(LegacyError::ChannelClosed)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_runs_on_the_loop_clock() {
    let (handle, task) = actor::spawn(extension());
    tokio::time::sleep(std::time::Duration::from_millis(365_000 + 50)).await;
    handle.shutdown().await.unwrap();

    let ext = task.join().await.unwrap();
    assert_eq!(
        sent_commands(&ext),
        vec![LegacyCommand::StartRequest, LegacyCommand::Alive]
    );
}
