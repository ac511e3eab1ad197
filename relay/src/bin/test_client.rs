use protocol::{
    BincodeCodec, Bundle, Codec, ConnectMessage, Message, MessageBody, MessageNumber,
    MAX_DATAGRAM_SIZE, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

// Prints every bundle that arrives until the socket stays quiet
async fn print_replies(socket: &UdpSocket, buf: &mut [u8]) {
    while let Ok(result) = timeout(Duration::from_millis(300), socket.recv(buf)).await {
        match result {
            Ok(len) => match BincodeCodec.decode(&buf[..len]) {
                Ok(bundle) => {
                    for message in bundle.messages() {
                        println!("  <- {} {:?}", message, message.body());
                    }
                }
                Err(e) => println!("Failed to decode bundle: {}", e),
            },
            Err(e) => println!("Error receiving: {}", e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    let connect_addr = "127.0.0.1:27888".parse::<SocketAddr>()?;
    let hello = ConnectMessage::Hello {
        protocol: PROTOCOL_VERSION.to_string(),
        username: "tester".to_string(),
    };
    println!("Sending hello to {}", connect_addr);
    socket.send_to(&hello.encode()?, connect_addr).await?;

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf)).await??;
    let port = match ConnectMessage::decode(&buf[..len])? {
        ConnectMessage::HelloD00d { port } => {
            println!("Session opened on port {}", port);
            port
        }
        other => {
            println!("Connection refused: {:?}", other);
            return Ok(());
        }
    };

    socket.connect((connect_addr.ip(), port)).await?;

    let script = vec![
        MessageBody::CreateGameRequest {
            rom_name: "Street Fighter II".to_string(),
        },
        MessageBody::GameChatRequest {
            message: "hello from the test client".to_string(),
        },
        MessageBody::UserReadyRequest,
        MessageBody::GameDataRequest {
            data: vec![0x01, 0x02, 0x03, 0x04],
        },
        MessageBody::CachedGameDataRequest { key: 0 },
        MessageBody::KeepAlive { value: 0 },
        MessageBody::PlayerDropRequest,
        MessageBody::QuitRequest {
            message: "bye".to_string(),
        },
    ];

    for (number, body) in script.into_iter().enumerate() {
        let message = Message::new(MessageNumber(number as u16), body);
        println!("-> {} {:?}", message, message.body());
        socket.send(&BincodeCodec.encode(&Bundle::single(message))?).await?;
        print_replies(&socket, &mut buf).await;
    }

    println!("Done");
    Ok(())
}
