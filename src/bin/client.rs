//! sift 클라이언트 (수신자)
//!
//! 서버에 파일을 요청하고 세그먼트를 조립해 저장하는 UDP 클라이언트.
//! - 타임아웃으로 누락을 감지하고 RETRANSMIT으로 선택 재전송 요청
//! - 한도 초과 시 부분 파일 저장 + 누락 시퀀스 보고
//!
//! 사용법:
//!   cargo run --release --bin sift-client -- [OPTIONS]
//!
//! 예시:
//!   # 기본 수신
//!   cargo run --release --bin sift-client -- --target 127.0.0.1:9000/data.bin
//!
//!   # 30% 손실 주입 재현 실험
//!   cargo run --release --bin sift-client -- -t 127.0.0.1:9000/data.bin --loss 0.3 --seed 7

use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::net::UdpSocket;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use sift::{Config, CountFallback, LossInjector, Receiver, RemoteTarget};

/// 클라이언트 설정
struct ClientArgs {
    bind_addr: SocketAddr,
    target: Option<String>,
    output_dir: PathBuf,
    loss_rate: Option<f64>,
    seed: Option<u64>,
    config: Config,
}

impl Default for ClientArgs {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:0".parse().expect("기본 주소"),
            target: None,
            output_dir: PathBuf::from("downloads"),
            loss_rate: None,
            seed: None,
            config: Config::default(),
        }
    }
}

fn parse_args() -> ClientArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ClientArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    config.bind_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--target" | "-t" => {
                if i + 1 < args.len() {
                    config.target = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--output-dir" | "-o" => {
                if i + 1 < args.len() {
                    config.output_dir = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--loss" => {
                if i + 1 < args.len() {
                    config.loss_rate = Some(args[i + 1].parse().expect("유효한 숫자 필요"));
                    i += 1;
                }
            }
            "--seed" => {
                if i + 1 < args.len() {
                    config.seed = Some(args[i + 1].parse().expect("유효한 숫자 필요"));
                    i += 1;
                }
            }
            "--timeout-ms" => {
                if i + 1 < args.len() {
                    config.config.recv_timeout_ms = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--retries" => {
                if i + 1 < args.len() {
                    config.config.retry_limit = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--fallback" => {
                if i + 1 < args.len() {
                    config.config.count_fallback = match args[i + 1].as_str() {
                        "1" => CountFallback::HighestPlusOne,
                        "2" => CountFallback::HighestPlusTwo,
                        other => panic!("--fallback 값은 1 또는 2 (입력: {})", other),
                    };
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!(
                    r#"sift client - UDP 파일 수신 클라이언트

서버에 파일을 요청하고 세그먼트를 조립해 저장한다.
누락 세그먼트는 RETRANSMIT으로 선택 재전송 요청하고,
재시도 한도 초과 시 부분 파일을 저장하며 누락 목록을 보고한다.

사용법:
  cargo run --release --bin sift-client -- [OPTIONS]

옵션:
  -t, --target <TARGET>   대상 지정 <호스트>:<포트>/<파일명> (필수)
  -b, --bind <ADDR>       로컬 바인드 주소 (기본: 0.0.0.0:0 = 자동 할당)
  -o, --output-dir <DIR>  저장 디렉터리 (기본: downloads)
  --loss <RATE>           수신 손실 주입 비율 0.0~1.0 (기본: 없음)
  --seed <N>              손실 주입 시드 (기본: 무작위, 로그에 기록)
  --timeout-ms <MS>       수신 타임아웃 밀리초 (기본: 2000)
  --retries <N>           재전송 재시도 한도 (기본: 3)
  --fallback <1|2>        종료 플래그 미수신 시 추정 정책:
                          최고 시퀀스 +1 또는 +2 (기본: 1)
  -h, --help              이 도움말 출력

예시:
  # 서버에서 파일 수신
  cargo run --release --bin sift-client -- --target 192.168.1.100:9000/data.bin

  # 손실 환경 재현 (시드 고정)
  cargo run --release --bin sift-client -- -t 127.0.0.1:9000/data.bin --loss 0.3 --seed 7

  # 불안정 링크용 재시도 확대
  cargo run --release --bin sift-client -- -t 10.0.0.2:9000/big.iso --retries 5 --timeout-ms 4000
"#
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let client_args = parse_args();

    let target_arg = client_args
        .target
        .ok_or("--target <호스트>:<포트>/<파일명> 인자가 필요합니다 (--help 참고)")?;
    let target: RemoteTarget = target_arg.parse()?;

    info!("sift client starting...");
    info!("Target: {}", target);
    info!("Output directory: {}", client_args.output_dir.display());

    // 호스트명 해석
    let responder = tokio::net::lookup_host(target.addr())
        .await?
        .next()
        .ok_or("서버 주소 해석 실패")?;

    let socket = UdpSocket::bind(client_args.bind_addr).await?;
    info!("Bound to local address: {}", socket.local_addr()?);

    let mut receiver = Receiver::new(client_args.config, client_args.output_dir);
    if let Some(rate) = client_args.loss_rate {
        let seed = client_args.seed.unwrap_or_else(rand::random);
        info!("Loss injection enabled: rate={}, seed={}", rate, seed);
        receiver = receiver.with_loss(LossInjector::random(rate, seed));
    }

    let report = receiver.fetch(&socket, responder, &target.filename).await?;

    info!("Transfer finished");
    info!("  Time: {:.2}s", report.elapsed.as_secs_f64());
    info!("  Output: {}", report.output_path.display());
    info!("  Bytes written: {}", report.bytes_written);
    match report.expected_segments {
        Some(expected) => info!("  Segments: {}/{}", report.segments_written, expected),
        None => info!("  Segments: {}", report.segments_written),
    }
    info!("  Retries: {}", report.retries);
    info!("  {}", report.stats.summary());

    if !report.is_complete() {
        warn!("Missing sequences: {:?}", report.missing);
        std::process::exit(1);
    }

    Ok(())
}
