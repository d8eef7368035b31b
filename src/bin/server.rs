//! sift 서버 (송신자)
//!
//! GET 요청을 받아 디렉터리의 파일을 세그먼트 단위로 전송하는 UDP 서버.
//! 피어별 세션 캐시로 RETRANSMIT 요청에 응답한다.
//!
//! 사용법:
//!   cargo run --release --bin sift-server -- [OPTIONS]
//!
//! 예시:
//!   # files/ 디렉터리 제공
//!   cargo run --release --bin sift-server -- --bind 0.0.0.0:9000 --dir files
//!
//!   # 전송 간격 없이 로컬 테스트
//!   cargo run --release --bin sift-server -- -d testdata --interval-us 0

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use sift::{Config, Sender};

/// 서버 설정
struct ServerArgs {
    bind_addr: SocketAddr,
    file_dir: PathBuf,
    config: Config,
}

impl Default for ServerArgs {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9000".parse().expect("기본 주소"),
            file_dir: PathBuf::from("files"),
            config: Config::default(),
        }
    }
}

fn parse_args() -> ServerArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ServerArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    config.bind_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--dir" | "-d" => {
                if i + 1 < args.len() {
                    config.file_dir = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--datagram-size" => {
                if i + 1 < args.len() {
                    config.config.datagram_size = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--interval-us" => {
                if i + 1 < args.len() {
                    config.config.send_interval_us = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!(
                    r#"sift server - UDP 파일 전송 서버

GET 요청을 받아 파일을 세그먼트 단위로 전송하고,
RETRANSMIT 요청에 세션 캐시로 응답한다.

사용법:
  cargo run --release --bin sift-server -- [OPTIONS]

옵션:
  -b, --bind <ADDR>        바인드 주소 (기본: 0.0.0.0:9000)
  -d, --dir <PATH>         제공 파일 디렉터리 (기본: files)
  --datagram-size <SIZE>   데이터그램 크기 바이트 (기본: 1024)
  --interval-us <US>       세그먼트 전송 간격 마이크로초 (기본: 100)
  -h, --help               이 도움말 출력

예시:
  # files/ 디렉터리 제공
  cargo run --release --bin sift-server -- --dir files

  # 저속 링크용 전송 간격 확대
  cargo run --release --bin sift-server -- --interval-us 1000
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

    let args = parse_args();

    info!("sift server starting...");
    info!("Bind address: {}", args.bind_addr);
    info!("File directory: {}", args.file_dir.display());
    info!(
        "Datagram size: {} bytes (payload {} bytes)",
        args.config.datagram_size,
        args.config.payload_capacity()
    );
    info!("Send interval: {} us", args.config.send_interval_us);

    tokio::fs::create_dir_all(&args.file_dir).await?;

    let socket = Arc::new(UdpSocket::bind(args.bind_addr).await?);
    info!("Server listening on {}", socket.local_addr()?);

    let sender = Sender::new(args.config, args.file_dir);
    sender.run(socket).await?;

    Ok(())
}
