use bedrock_rak::protocol::mcpe::{Gamemode, Motd};
use bedrock_rak::{Listener, ServerEvent};

#[async_std::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut server = Listener::bind("0.0.0.0:19132").await.unwrap();

    let mut motd = Motd::new(server.id, "RakNet Rust (async-std)!");
    motd.gamemode = Gamemode::Creative;
    motd.player_max = 100;
    server.set_motd(&motd).await;

    server.start().await.unwrap();

    loop {
        match server.recv_event().await {
            Ok(ServerEvent::Connect(conn)) => {
                println!("{} connected with mtu {}", conn.address, conn.mtu());
            }
            Ok(ServerEvent::Packet(conn, payload)) => {
                println!("Got a {} byte packet from {}", payload.len(), conn.address);
                // echo it back
                if let Err(e) = conn.send(&payload).await {
                    println!("Failed to reply to {}: {}", conn.address, e);
                }
            }
            Ok(ServerEvent::Disconnect(conn)) => {
                println!("{} disconnected", conn.address);
            }
            Err(e) => {
                println!("Listener closed: {}", e);
                break;
            }
        }
    }
}
