use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use maze_escape_server::constants::{CONNECT_RETRY_SECS, DEFAULT_PORT};
use maze_escape_server::protocol::{decode_frame, FRAME_DELIMITER, LEAVE_FRAME};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Host the game server runs on.
    #[arg(long, default_value = "localhost")]
    host: String,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    println!("Waiting for the server.");
    let stream = loop {
        match TcpStream::connect((cli.host.as_str(), cli.port)).await {
            Ok(stream) => break stream,
            Err(_) => tokio::time::sleep(Duration::from_secs(CONNECT_RETRY_SECS)).await,
        }
    };
    println!("You are connected to the server.");

    let (read_half, mut write_half) = stream.into_split();
    let mut frames = BufReader::new(read_half);
    let mut raw = Vec::new();
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            received = frames.read_until(FRAME_DELIMITER, &mut raw) => {
                match received {
                    Ok(0) | Err(_) => {
                        println!("\nThe server closed the connection.");
                        break;
                    }
                    Ok(_) => {
                        if raw.last() == Some(&FRAME_DELIMITER) {
                            raw.pop();
                        }
                        let frame = decode_frame(&raw);
                        raw.clear();
                        if frame == LEAVE_FRAME {
                            println!("\nThe server closed the connection.");
                            break;
                        }
                        println!("{frame}");
                    }
                }
            }
            line = input.next_line() => {
                // Q and end-of-input both turn into the disconnect sentinel.
                let line = match line {
                    Ok(Some(line)) if line.eq_ignore_ascii_case("Q") => LEAVE_FRAME.to_string(),
                    Ok(Some(line)) => line,
                    _ => LEAVE_FRAME.to_string(),
                };
                let leaving = line == LEAVE_FRAME;
                let mut bytes = line.into_bytes();
                bytes.push(FRAME_DELIMITER);
                if write_half.write_all(&bytes).await.is_err() || leaving {
                    break;
                }
            }
        }
    }
    Ok(())
}
