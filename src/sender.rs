//! 송신자 (서버측)
//!
//! GET 요청을 받아 파일을 세그먼트 단위로 전송하고,
//! 피어별 세션 캐시를 근거로 RETRANSMIT 요청에 응답한다.

use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::message::{error_reply, Request};
use crate::packet::Packet;
use crate::segment::{Segmenter, SequenceNumber};
use crate::session::SessionCache;
use crate::stats::TransferStats;
use crate::{Config, Error, Result};

/// 수신 대기 중 정지 플래그 확인 주기
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 송신자
pub struct Sender {
    /// 설정
    config: Config,

    /// 제공 파일 디렉터리
    file_dir: PathBuf,

    /// 세그먼트 분할기
    segmenter: Segmenter,

    /// 피어별 전송 캐시
    cache: SessionCache,

    /// 전송 통계
    stats: RwLock<TransferStats>,

    /// 실행 중 플래그
    running: AtomicBool,
}

impl Sender {
    /// 새 송신자 생성
    pub fn new(config: Config, file_dir: impl Into<PathBuf>) -> Self {
        let segmenter = Segmenter::new(config.payload_capacity());

        Self {
            config,
            file_dir: file_dir.into(),
            segmenter,
            cache: SessionCache::new(),
            stats: RwLock::new(TransferStats::new()),
            running: AtomicBool::new(false),
        }
    }

    /// 요청 수신 루프
    ///
    /// 요청은 도착 순서대로 처리한다. 요청 하나의 처리 실패는
    /// 경고만 남기고 루프는 계속된다. [`Sender::stop`] 호출 시
    /// 다음 폴링 주기에 종료.
    pub async fn run(&self, socket: Arc<UdpSocket>) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);

        info!(
            "송신자 시작: {} (파일 디렉터리: {})",
            socket.local_addr()?,
            self.file_dir.display()
        );

        let mut buf = vec![0u8; 65535];

        while self.running.load(Ordering::SeqCst) {
            let (len, peer) =
                match tokio::time::timeout(POLL_INTERVAL, socket.recv_from(&mut buf)).await {
                    Ok(Ok(received)) => received,
                    Ok(Err(e)) => {
                        warn!("수신 에러: {}", e);
                        continue;
                    }
                    // 타임아웃: 정지 플래그 재확인
                    Err(_) => continue,
                };

            if let Err(e) = self.handle_request(&socket, peer, &buf[..len]).await {
                warn!("요청 처리 에러 ({}): {}", peer, e);
            }
        }

        info!("송신자 종료");
        Ok(())
    }

    /// 요청 1건 파싱 및 분기
    async fn handle_request(
        &self,
        socket: &UdpSocket,
        peer: SocketAddr,
        datagram: &[u8],
    ) -> Result<()> {
        match Request::parse(datagram) {
            Some(Request::Get { filename }) => self.serve(socket, peer, &filename).await,
            Some(Request::Retransmit { sequences }) => {
                self.retransmit(socket, peer, &sequences).await
            }
            None => {
                self.stats.write().malformed_requests += 1;
                debug!("해석 불가 요청 무시 ({}): {} bytes", peer, datagram.len());
                Ok(())
            }
        }
    }

    /// GET 처리: 파일 분할, 캐시 갱신, 전체 세그먼트 전송
    async fn serve(&self, socket: &UdpSocket, peer: SocketAddr, filename: &str) -> Result<()> {
        let relative = Path::new(filename);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            warn!("경로 이탈 요청 거부 ({}): {}", peer, filename);
            socket
                .send_to(&error_reply("Invalid file path"), peer)
                .await?;
            return Ok(());
        }

        let path = self.file_dir.join(relative);
        let segments = match self.segmenter.split_file(&path).await {
            Ok(segments) => segments,
            Err(e) => {
                warn!("파일 준비 실패 ({}): {}", peer, e);
                let reason = match &e {
                    Error::FileNotFound { .. } => "File not found".to_string(),
                    other => format!("Read failed: {}", other),
                };
                socket.send_to(&error_reply(&reason), peer).await?;
                return Ok(());
            }
        };

        let total = segments.len();
        // 같은 피어의 이전 세션은 통째로 대체
        self.cache.put(peer, segments.clone());

        let mut sent_bytes = 0u64;
        for segment in &segments {
            let bytes = Packet::from_segment(segment).to_bytes();
            socket.send_to(&bytes, peer).await?;
            sent_bytes += bytes.len() as u64;

            if self.config.send_interval_us > 0 {
                tokio::time::sleep(Duration::from_micros(self.config.send_interval_us)).await;
            }
        }

        {
            let mut stats = self.stats.write();
            stats.segments_sent += total as u64;
            stats.bytes_sent += sent_bytes;
        }

        info!(
            "전송 완료 ({}): {} ({} 세그먼트, {} bytes)",
            peer, filename, total, sent_bytes
        );
        Ok(())
    }

    /// RETRANSMIT 처리: 캐시된 세션에서 요청 순서대로 재전송
    ///
    /// 캐시에 세션이 없으면 조용히 무시하고, 범위 밖 시퀀스는 건너뛴다.
    async fn retransmit(
        &self,
        socket: &UdpSocket,
        peer: SocketAddr,
        sequences: &[SequenceNumber],
    ) -> Result<()> {
        let cached = match self.cache.get(&peer) {
            Some(cached) => cached,
            None => {
                self.stats.write().stale_retransmits += 1;
                debug!("캐시 없는 재전송 요청 무시 ({})", peer);
                return Ok(());
            }
        };

        let mut served = 0u64;
        let mut sent_bytes = 0u64;
        for &sequence in sequences {
            let segment = match cached.segments.get(sequence as usize) {
                Some(segment) => segment,
                None => {
                    debug!("범위 밖 시퀀스 무시 ({}): {}", peer, sequence);
                    continue;
                }
            };

            let bytes = Packet::from_segment(segment).to_bytes();
            socket.send_to(&bytes, peer).await?;
            served += 1;
            sent_bytes += bytes.len() as u64;
        }

        {
            let mut stats = self.stats.write();
            stats.retransmits_served += served;
            stats.segments_sent += served;
            stats.bytes_sent += sent_bytes;
        }

        debug!(
            "재전송 ({}): 요청 {}건 중 {}건 응답 (세션 {:.1}s 경과)",
            peer,
            sequences.len(),
            served,
            cached.cached_at.elapsed().as_secs_f64()
        );
        Ok(())
    }

    /// 정지
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// 통계 반환
    pub fn stats(&self) -> TransferStats {
        self.stats.read().clone()
    }
}
