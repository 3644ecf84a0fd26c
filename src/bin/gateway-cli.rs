use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use coap_lite::{CoapOption, MessageClass, MessageType, Packet, RequestType};
use serde_json::Value;
use tokio::net::UdpSocket;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Client and admin CLI for the RPC gateway", long_about = None)]
struct Cli {
    /// HTTP endpoint of the gateway.
    #[arg(short, long, default_value = "http://127.0.0.1:28690")]
    url: String,

    /// CoAP endpoint of the gateway.
    #[arg(short, long, default_value = "127.0.0.1:18991")]
    coap: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one HTTP request to a route
    Call {
        path: String,
        #[arg(short = 'X', long, default_value = "POST")]
        method: String,
        #[arg(short, long, default_value = "")]
        data: String,
    },
    /// Send one confirmable CoAP request to a route
    Coap {
        path: String,
        #[arg(short = 'X', long, value_enum, default_value_t = CoapMethod::Post)]
        method: CoapMethod,
        #[arg(short, long, default_value = "")]
        data: String,
    },
    /// Ask the gateway to shut down
    Exit,
}

#[derive(Clone, Copy, ValueEnum)]
enum CoapMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl From<CoapMethod> for RequestType {
    fn from(method: CoapMethod) -> Self {
        match method {
            CoapMethod::Get => RequestType::Get,
            CoapMethod::Post => RequestType::Post,
            CoapMethod::Put => RequestType::Put,
            CoapMethod::Delete => RequestType::Delete,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Call { path, method, data } => {
            let method = reqwest::Method::from_bytes(method.as_bytes())?;
            let res = client
                .request(method, format!("{}{}", cli.url, path))
                .body(data)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Coap { path, method, data } => {
            coap_call(&cli.coap, &path, method.into(), data.into_bytes()).await?;
        }
        Commands::Exit => {
            // The gateway stops without answering.
            let _ = client.get(format!("{}/root/exit", cli.url)).send().await;
            println!("Exit requested");
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        eprintln!("Response: {}", text);
        return Ok(());
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}

async fn coap_call(
    address: &str,
    path: &str,
    method: RequestType,
    payload: Vec<u8>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut request = Packet::new();
    request.header.set_type(MessageType::Confirmable);
    request.header.code = MessageClass::Request(method);
    request.header.message_id = 1;
    request.set_token(vec![0x42]);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        request.add_option(CoapOption::UriPath, segment.as_bytes().to_vec());
    }
    request.payload = payload;

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.send_to(&request.to_bytes()?, address).await?;

    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let (len, _) = tokio::time::timeout(Duration::from_secs(15), socket.recv_from(&mut buf)).await??;
        let packet = Packet::from_bytes(&buf[..len])?;
        if packet.header.get_type() == MessageType::Acknowledgement && packet.header.code == MessageClass::Empty {
            continue;
        }
        println!("{:?}", packet.header.code);
        println!("{}", String::from_utf8_lossy(&packet.payload));
        return Ok(());
    }
}
