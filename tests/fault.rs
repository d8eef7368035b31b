//! 손실, 손상, 비정상 요청 시나리오 통합 테스트
//!
//! 손실 주입기와 각본형 가짜 응답자로 복구 경로와
//! 부분 실패 경로를 검증한다.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;

use sift::{Config, CountFallback, LossInjector, Packet, Receiver, Segment, Segmenter, Sender};

async fn spawn_responder(config: Config, file_dir: &Path) -> (Arc<Sender>, SocketAddr) {
    let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let addr = socket.local_addr().unwrap();
    let sender = Arc::new(Sender::new(config, file_dir));

    let run_sender = sender.clone();
    tokio::spawn(async move {
        run_sender.run(socket).await.unwrap();
    });

    (sender, addr)
}

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn segment(sequence: u32, byte: u8, len: usize, is_last: bool) -> Segment {
    Segment {
        sequence,
        payload: Bytes::from(vec![byte; len]),
        is_last,
    }
}

/// GET에 일부 시퀀스를 빼고 응답하고, 재전송 요청은 세기만 하는 응답자
async fn run_gap_responder(socket: UdpSocket, payload: Vec<u8>, skip: Vec<u32>) -> usize {
    let mut buf = vec![0u8; 2048];
    let (len, peer) = socket.recv_from(&mut buf).await.unwrap();
    assert!(buf[..len].starts_with(b"GET "));

    let segmenter = Segmenter::new(Config::default().payload_capacity());
    for segment in segmenter.split(&payload) {
        if skip.contains(&segment.sequence) {
            continue;
        }
        let bytes = Packet::from_segment(&segment).to_bytes();
        socket.send_to(&bytes, peer).await.unwrap();
    }

    let mut retransmit_requests = 0;
    while let Ok(Ok((len, _))) =
        tokio::time::timeout(Duration::from_secs(1), socket.recv_from(&mut buf)).await
    {
        if buf[..len].starts_with(b"RETRANSMIT:") {
            retransmit_requests += 1;
        }
    }
    retransmit_requests
}

#[tokio::test]
async fn test_dropped_segment_recovered_by_retransmit() {
    let file_dir = tempfile::tempdir().unwrap();
    let download_dir = tempfile::tempdir().unwrap();

    let payload = patterned(5000);
    std::fs::write(file_dir.path().join("data.bin"), &payload).unwrap();

    let (_sender, responder) = spawn_responder(Config::local_test(), file_dir.path()).await;

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut receiver = Receiver::new(Config::local_test(), download_dir.path())
        .with_loss(LossInjector::scripted([2]));
    let report = receiver.fetch(&socket, responder, "data.bin").await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.retries, 0);
    assert_eq!(report.stats.simulated_drops, 1);
    assert_eq!(report.stats.retransmit_requests, 1);
    assert_eq!(std::fs::read(&report.output_path).unwrap(), payload);
}

#[tokio::test]
async fn test_multiple_drops_recovered_in_one_round() {
    let file_dir = tempfile::tempdir().unwrap();
    let download_dir = tempfile::tempdir().unwrap();

    let payload = patterned(5000);
    std::fs::write(file_dir.path().join("data.bin"), &payload).unwrap();

    let (_sender, responder) = spawn_responder(Config::local_test(), file_dir.path()).await;

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut receiver = Receiver::new(Config::local_test(), download_dir.path())
        .with_loss(LossInjector::scripted([1, 3]));
    let report = receiver.fetch(&socket, responder, "data.bin").await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.stats.simulated_drops, 2);
    assert_eq!(report.stats.retransmit_requests, 1);
    assert_eq!(std::fs::read(&report.output_path).unwrap(), payload);
}

#[tokio::test]
async fn test_silent_responder_writes_partial_file() {
    let download_dir = tempfile::tempdir().unwrap();
    let payload = patterned(5000);

    let server_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let responder = server_socket.local_addr().unwrap();
    let counter = tokio::spawn(run_gap_responder(server_socket, payload.clone(), vec![2]));

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut receiver = Receiver::new(Config::local_test(), download_dir.path());
    let report = receiver.fetch(&socket, responder, "data.bin").await.unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.missing, vec![2]);
    assert_eq!(report.retries, 3);
    assert_eq!(report.segments_written, 4);
    assert_eq!(report.expected_segments, Some(5));
    assert_eq!(report.stats.retransmit_requests, 3);

    // 보유분만 오름차순으로 기록된다
    let capacity = Config::local_test().payload_capacity();
    let mut expected_bytes = Vec::new();
    expected_bytes.extend_from_slice(&payload[..2 * capacity]);
    expected_bytes.extend_from_slice(&payload[3 * capacity..]);
    assert_eq!(std::fs::read(&report.output_path).unwrap(), expected_bytes);
    assert_eq!(report.bytes_written, expected_bytes.len() as u64);

    // 재시도 한도만큼만 재전송을 요청한다
    assert_eq!(counter.await.unwrap(), 3);
}

#[tokio::test]
async fn test_corrupt_and_duplicate_packets_discarded() {
    let download_dir = tempfile::tempdir().unwrap();

    let server_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let responder = server_socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 2048];
        let (len, peer) = server_socket.recv_from(&mut buf).await.unwrap();
        assert!(buf[..len].starts_with(b"GET "));

        // 정상 seq0
        let first = Packet::from_segment(&segment(0, 0xAA, 100, false)).to_bytes();
        server_socket.send_to(&first, peer).await.unwrap();
        // 같은 seq0에 다른 내용: 먼저 도착한 쪽이 유지되어야 한다
        let conflicting = Packet::from_segment(&segment(0, 0xBB, 100, false)).to_bytes();
        server_socket.send_to(&conflicting, peer).await.unwrap();
        // 손상된 seq1 후 정상 seq1
        let mut corrupt = Packet::from_segment(&segment(1, 0xCC, 100, false)).to_bytes();
        let tail_index = corrupt.len() - 1;
        corrupt[tail_index] ^= 0x01;
        server_socket.send_to(&corrupt, peer).await.unwrap();
        let valid = Packet::from_segment(&segment(1, 0xCC, 100, false)).to_bytes();
        server_socket.send_to(&valid, peer).await.unwrap();
        // 종료 세그먼트 두 번
        let last = Packet::from_segment(&segment(2, 0xDD, 50, true)).to_bytes();
        server_socket.send_to(&last, peer).await.unwrap();
        server_socket.send_to(&last, peer).await.unwrap();
    });

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut receiver = Receiver::new(Config::local_test(), download_dir.path());
    let report = receiver.fetch(&socket, responder, "data.bin").await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.segments_written, 3);
    assert_eq!(report.stats.corrupt_discarded, 1);
    assert_eq!(report.stats.duplicate_discarded, 2);
    assert_eq!(report.stats.retransmit_requests, 0);

    let mut expected_bytes = vec![0xAA; 100];
    expected_bytes.extend_from_slice(&[0xCC; 100]);
    expected_bytes.extend_from_slice(&[0xDD; 50]);
    assert_eq!(std::fs::read(&report.output_path).unwrap(), expected_bytes);
}

#[tokio::test]
async fn test_plus_one_fallback_misses_dropped_tail() {
    let file_dir = tempfile::tempdir().unwrap();
    let download_dir = tempfile::tempdir().unwrap();

    let payload = patterned(5000);
    std::fs::write(file_dir.path().join("data.bin"), &payload).unwrap();

    let (_sender, responder) = spawn_responder(Config::local_test(), file_dir.path()).await;

    // 종료 플래그가 달린 마지막 세그먼트를 잃으면
    // 최고+1 추정은 공백을 못 본다
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut receiver = Receiver::new(Config::local_test(), download_dir.path())
        .with_loss(LossInjector::scripted([4]));
    let report = receiver.fetch(&socket, responder, "data.bin").await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.segments_written, 4);
    assert_eq!(report.expected_segments, Some(4));
    assert_eq!(report.stats.retransmit_requests, 0);

    let capacity = Config::local_test().payload_capacity();
    assert_eq!(report.bytes_written, (4 * capacity) as u64);
    assert_eq!(
        std::fs::read(&report.output_path).unwrap(),
        &payload[..4 * capacity]
    );
}

#[tokio::test]
async fn test_plus_two_fallback_recovers_dropped_tail() {
    let file_dir = tempfile::tempdir().unwrap();
    let download_dir = tempfile::tempdir().unwrap();

    let payload = patterned(5000);
    std::fs::write(file_dir.path().join("data.bin"), &payload).unwrap();

    let (_sender, responder) = spawn_responder(Config::local_test(), file_dir.path()).await;

    let mut config = Config::local_test();
    config.count_fallback = CountFallback::HighestPlusTwo;

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut receiver = Receiver::new(config, download_dir.path())
        .with_loss(LossInjector::scripted([4]));
    let report = receiver.fetch(&socket, responder, "data.bin").await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.bytes_written, 5000);
    // 재전송으로 받은 종료 플래그가 추정치를 확정한다
    assert_eq!(report.expected_segments, Some(5));
    assert_eq!(report.stats.retransmit_requests, 1);
    assert_eq!(std::fs::read(&report.output_path).unwrap(), payload);
}

#[tokio::test]
async fn test_malformed_and_stale_requests_ignored() {
    let file_dir = tempfile::tempdir().unwrap();
    let download_dir = tempfile::tempdir().unwrap();

    let payload = patterned(2500);
    std::fs::write(file_dir.path().join("data.bin"), &payload).unwrap();

    let (sender, responder) = spawn_responder(Config::local_test(), file_dir.path()).await;

    let probe = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    probe.send_to(&[0xff, 0xfe, 0x00], responder).await.unwrap();
    probe.send_to(b"PUT /x", responder).await.unwrap();
    probe.send_to(b"RETRANSMIT:1,x", responder).await.unwrap();
    // 세션 캐시가 없는 피어의 재전송 요청
    probe.send_to(b"RETRANSMIT:0,1", responder).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // 서버는 계속 정상 요청을 처리한다
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut receiver = Receiver::new(Config::local_test(), download_dir.path());
    let report = receiver.fetch(&socket, responder, "data.bin").await.unwrap();
    assert!(report.is_complete());

    let stats = sender.stats();
    assert_eq!(stats.malformed_requests, 3);
    assert_eq!(stats.stale_retransmits, 1);
}

#[tokio::test]
async fn test_out_of_range_retransmit_skipped() {
    let file_dir = tempfile::tempdir().unwrap();
    let download_dir = tempfile::tempdir().unwrap();

    let payload = patterned(2500);
    std::fs::write(file_dir.path().join("data.bin"), &payload).unwrap();

    let (sender, responder) = spawn_responder(Config::local_test(), file_dir.path()).await;

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut receiver = Receiver::new(Config::local_test(), download_dir.path());
    let report = receiver.fetch(&socket, responder, "data.bin").await.unwrap();
    assert!(report.is_complete());

    // 범위 밖 시퀀스는 조용히 건너뛴다
    socket.send_to(b"RETRANSMIT:99", responder).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sender.stats().retransmits_served, 0);

    // 유효 범위 시퀀스는 다시 받아볼 수 있다
    socket.send_to(b"RETRANSMIT:1", responder).await.unwrap();
    let mut buf = vec![0u8; 2048];
    let (len, _) = tokio::time::timeout(Duration::from_secs(1), socket.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    let packet = Packet::from_bytes(&buf[..len]).unwrap();
    assert_eq!(packet.sequence, 1);
    assert!(packet.verify_digest());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(sender.stats().retransmits_served, 1);
}
