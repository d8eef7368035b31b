//! 수신자 (클라이언트측)
//!
//! - 파일 요청 및 세그먼트 조립
//! - 타임아웃 기반 공백 감지와 선택적 재전송 요청
//! - 시드 고정 손실 주입

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use bytes::Bytes;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::message::{parse_error_reply, Request};
use crate::packet::Packet;
use crate::segment::SequenceNumber;
use crate::stats::TransferStats;
use crate::{Config, CountFallback, Error, Result};

/// 수신 손실 주입기
///
/// 1차 수신 경로에서 패킷을 의도적으로 버려 손실 환경을 재현한다.
/// 재전송 수신에는 적용하지 않는다.
#[derive(Debug)]
pub struct LossInjector {
    kind: Kind,
}

#[derive(Debug)]
enum Kind {
    Disabled,
    Random { rate: f64, rng: StdRng },
    Scripted { drops: HashSet<SequenceNumber> },
}

impl LossInjector {
    /// 손실 없음
    pub fn disabled() -> Self {
        Self {
            kind: Kind::Disabled,
        }
    }

    /// 시드 고정 확률 손실 (rate: 0.0 ~ 1.0)
    pub fn random(rate: f64, seed: u64) -> Self {
        Self {
            kind: Kind::Random {
                rate: rate.clamp(0.0, 1.0),
                rng: StdRng::seed_from_u64(seed),
            },
        }
    }

    /// 지정 시퀀스를 각 1회씩 손실
    pub fn scripted(sequences: impl IntoIterator<Item = SequenceNumber>) -> Self {
        Self {
            kind: Kind::Scripted {
                drops: sequences.into_iter().collect(),
            },
        }
    }

    /// 이 패킷을 버릴지 결정
    pub fn should_drop(&mut self, sequence: SequenceNumber) -> bool {
        match &mut self.kind {
            Kind::Disabled => false,
            Kind::Random { rate, rng } => rng.gen::<f64>() < *rate,
            Kind::Scripted { drops } => drops.remove(&sequence),
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.kind, Kind::Disabled)
    }
}

impl Default for LossInjector {
    fn default() -> Self {
        Self::disabled()
    }
}

/// 조립 버퍼
///
/// 시퀀스 번호 키의 정렬 맵. 같은 시퀀스는 먼저 도착한 페이로드가
/// 이기고, 종료 플래그 첫 관측 시 기대 세그먼트 수를 확정한다.
struct Assembly {
    buffer: BTreeMap<SequenceNumber, Bytes>,
    expected: Option<u32>,
}

impl Assembly {
    fn new() -> Self {
        Self {
            buffer: BTreeMap::new(),
            expected: None,
        }
    }

    /// 데이터그램 1건 흡수
    ///
    /// 잘린 패킷과 다이제스트 불일치 패킷은 버리고 계속한다.
    fn absorb(
        &mut self,
        datagram: &[u8],
        loss: &mut LossInjector,
        apply_loss: bool,
        stats: &mut TransferStats,
    ) {
        let packet = match Packet::from_bytes(datagram) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("패킷 폐기: {}", e);
                return;
            }
        };

        if apply_loss && loss.should_drop(packet.sequence) {
            stats.simulated_drops += 1;
            debug!("손실 주입: seq={}", packet.sequence);
            return;
        }

        if !packet.verify_digest() {
            stats.corrupt_discarded += 1;
            warn!("다이제스트 불일치 폐기: seq={}", packet.sequence);
            return;
        }

        match self.buffer.entry(packet.sequence) {
            Entry::Vacant(entry) => {
                stats.segments_received += 1;
                stats.bytes_received += datagram.len() as u64;
                entry.insert(packet.payload.clone());
            }
            Entry::Occupied(_) => {
                stats.duplicate_discarded += 1;
                debug!("중복 폐기: seq={}", packet.sequence);
            }
        }

        if packet.is_last && self.expected.is_none() {
            let count = packet.sequence.saturating_add(1);
            self.expected = Some(count);
            debug!("종료 플래그 관측: 기대 세그먼트 수 {}", count);
        }
    }

    /// 기대 세그먼트 수
    ///
    /// 종료 플래그를 못 봤으면 최고 시퀀스 기반 대체 추정.
    /// 아무것도 수신하지 못했으면 `None`.
    fn expected_count(&self, fallback: CountFallback) -> Option<u32> {
        match self.expected {
            Some(count) => Some(count),
            None => self
                .buffer
                .keys()
                .next_back()
                .map(|&highest| fallback.estimate(highest)),
        }
    }

    /// 누락 시퀀스 목록 (오름차순)
    fn missing(&self, fallback: CountFallback) -> Vec<SequenceNumber> {
        let count = match self.expected_count(fallback) {
            Some(count) => count,
            None => return Vec::new(),
        };
        (0..count)
            .filter(|sequence| !self.buffer.contains_key(sequence))
            .collect()
    }

    fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn len(&self) -> usize {
        self.buffer.len()
    }

    /// 보유 페이로드 전체를 오름차순으로 이어 붙임
    fn into_data(self) -> Vec<u8> {
        let total: usize = self.buffer.values().map(|payload| payload.len()).sum();
        let mut data = Vec::with_capacity(total);
        for payload in self.buffer.values() {
            data.extend_from_slice(payload);
        }
        data
    }
}

/// 전송 1건의 결과
#[derive(Debug, Clone)]
pub struct TransferReport {
    /// 기록한 파일 경로
    pub output_path: PathBuf,

    /// 기록 바이트 수
    pub bytes_written: u64,

    /// 기록 세그먼트 수
    pub segments_written: usize,

    /// 최종 누락 시퀀스 (비어 있으면 완전 수신)
    pub missing: Vec<SequenceNumber>,

    /// 기대 세그먼트 수 (종료 플래그 또는 추정)
    pub expected_segments: Option<u32>,

    /// 소진한 재시도 횟수
    pub retries: u32,

    /// 경과 시간
    pub elapsed: Duration,

    /// 수신 통계
    pub stats: TransferStats,
}

impl TransferReport {
    /// 누락 없이 수신했는지
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// 수신자
pub struct Receiver {
    /// 설정
    config: Config,

    /// 저장 디렉터리
    download_dir: PathBuf,

    /// 손실 주입기
    loss: LossInjector,
}

impl Receiver {
    /// 새 수신자 생성 (손실 주입 없음)
    pub fn new(config: Config, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            download_dir: download_dir.into(),
            loss: LossInjector::disabled(),
        }
    }

    /// 손실 주입기 장착
    pub fn with_loss(mut self, loss: LossInjector) -> Self {
        self.loss = loss;
        self
    }

    /// 파일 1건 수신
    ///
    /// GET 전송 후 조용해질 때까지 1차 수신, 누락 감지 시
    /// RETRANSMIT 요청을 재시도 한도까지 반복한다. 한도 소진 시
    /// 보유분만으로 부분 파일을 기록하고 누락 목록을 보고한다.
    pub async fn fetch(
        &mut self,
        socket: &UdpSocket,
        responder: SocketAddr,
        filename: &str,
    ) -> Result<TransferReport> {
        let started = Instant::now();
        let mut stats = TransferStats::new();

        // 저장 파일명은 요청 경로의 마지막 요소만 사용
        let output_name = Path::new(filename)
            .file_name()
            .ok_or_else(|| Error::InvalidTarget {
                input: filename.to_string(),
                reason: "파일명이 비어 있음".to_string(),
            })?;
        let output_path = self.download_dir.join(output_name);

        let request = Request::Get {
            filename: filename.to_string(),
        };
        socket.send_to(&request.to_bytes(), responder).await?;
        info!("파일 요청: {} -> {}", filename, responder);

        let recv_timeout = Duration::from_millis(self.config.recv_timeout_ms);
        let mut buf = vec![0u8; 65535];
        let mut assembly = Assembly::new();
        let mut remote_error: Option<String> = None;

        // 1차 수신: 타임아웃까지 도착분 전부 흡수
        loop {
            match tokio::time::timeout(recv_timeout, socket.recv_from(&mut buf)).await {
                Ok(Ok((len, _from))) => {
                    let datagram = &buf[..len];
                    if let Some(reason) = parse_error_reply(datagram) {
                        warn!("오류 응답: {}", reason);
                        remote_error = Some(reason);
                        break;
                    }
                    assembly.absorb(datagram, &mut self.loss, true, &mut stats);
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => break,
            }
        }

        if assembly.is_empty() {
            return Err(match remote_error {
                Some(message) => Error::RemoteError { message },
                None => Error::NothingReceived,
            });
        }
        if let Some(reason) = remote_error {
            warn!("일부 수신 후 오류 응답 도착, 수신분으로 진행: {}", reason);
        }

        // 공백 복구: 현재 누락 목록으로 재전송 요청 반복
        let mut missing = assembly.missing(self.config.count_fallback);
        let mut retries = 0u32;

        if !missing.is_empty() {
            debug!("누락 감지: {:?}", missing);
            self.request_retransmit(socket, responder, &missing, &mut stats)
                .await?;

            loop {
                match tokio::time::timeout(recv_timeout, socket.recv_from(&mut buf)).await {
                    Ok(Ok((len, _from))) => {
                        assembly.absorb(&buf[..len], &mut self.loss, false, &mut stats);
                        missing = assembly.missing(self.config.count_fallback);
                        if missing.is_empty() {
                            break;
                        }
                    }
                    Ok(Err(e)) => return Err(e.into()),
                    Err(_) => {
                        retries += 1;
                        if retries >= self.config.retry_limit {
                            warn!("재시도 한도 도달: {}회, 누락 {:?}", retries, missing);
                            break;
                        }
                        self.request_retransmit(socket, responder, &missing, &mut stats)
                            .await?;
                    }
                }
            }
        }

        // 기록: 완전 여부와 무관하게 보유분 전체
        tokio::fs::create_dir_all(&self.download_dir).await?;
        let expected_segments = assembly.expected_count(self.config.count_fallback);
        let segments_written = assembly.len();
        let data = assembly.into_data();
        tokio::fs::write(&output_path, &data).await?;

        let report = TransferReport {
            output_path,
            bytes_written: data.len() as u64,
            segments_written,
            missing,
            expected_segments,
            retries,
            elapsed: started.elapsed(),
            stats,
        };

        if report.is_complete() {
            info!(
                "수신 완료: {} ({} bytes, {} 세그먼트, 재시도 {}회)",
                report.output_path.display(),
                report.bytes_written,
                report.segments_written,
                report.retries
            );
        } else {
            warn!(
                "부분 수신: {} (누락 시퀀스 {:?})",
                report.output_path.display(),
                report.missing
            );
        }

        Ok(report)
    }

    /// 누락 목록 재전송 요청
    async fn request_retransmit(
        &self,
        socket: &UdpSocket,
        responder: SocketAddr,
        missing: &[SequenceNumber],
        stats: &mut TransferStats,
    ) -> Result<()> {
        let request = Request::Retransmit {
            sequences: missing.to_vec(),
        };
        socket.send_to(&request.to_bytes(), responder).await?;
        stats.retransmit_requests += 1;
        debug!("재전송 요청: {:?}", missing);
        Ok(())
    }
}
