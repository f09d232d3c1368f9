//! Simple IRC client example
//!
//! Demonstrates connecting to a server and driving the connection
//! through [`Client::tick`]: registration, joining a channel, replying
//! to greetings, and a clean `QUIT` on shutdown.

use tokio::net::TcpStream;

use ircaster::client::Tick;
use ircaster::event::Event;
use ircaster::state::{HandshakeConfig, SaslMode, TlsMode};
use ircaster::{Client, Message};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let stream = TcpStream::connect("irc.libera.chat:6667").await?;

    let config = HandshakeConfig {
        nickname: "example_bot".to_string(),
        username: "example".to_string(),
        realname: "Example Bot".to_string(),
        password: None,
        tls_mode: TlsMode::Plaintext,
        sasl_mode: SaslMode::Disabled,
        sasl_mechanisms: Vec::new(),
        sasl_credentials: None,
    };

    let mut client = Client::new(stream, config);
    client.start().await?;

    let mut joined = false;

    loop {
        match client.tick().await {
            Tick::HandshakeComplete => {
                println!("registration successful");
                client.send(&Message::join("#example")).await?;
            }
            Tick::Line { events, .. } => {
                for event in events {
                    match event {
                        Event::Joined { channel, nickname } if !joined => {
                            if channel == "#example" {
                                joined = true;
                                client
                                    .send(&Message::privmsg(
                                        "#example",
                                        "Hello from ircaster example!",
                                    ))
                                    .await?;
                            }
                            println!("{} joined {}", nickname, channel);
                        }
                        Event::Message {
                            from,
                            target,
                            text,
                            is_notice: false,
                        } => {
                            println!("<{}> {}", from, text);
                            if text.contains("hello") {
                                client
                                    .send(&Message::privmsg(target, "Hello there!"))
                                    .await?;
                            }
                        }
                        Event::Exception { message, fatal } => {
                            eprintln!("error: {} (fatal: {})", message, fatal);
                        }
                        _ => {}
                    }
                }
            }
            Tick::PingSent => {}
            Tick::PingTimeout => {
                eprintln!("ping timeout, disconnecting");
                break;
            }
            Tick::Disconnected(reason) => {
                println!("disconnected: {:?}", reason);
                break;
            }
            Tick::TlsUpgradeRequested | Tick::ReconnectRequested { .. } => {
                // This example only runs in plaintext mode.
                break;
            }
        }
    }

    Ok(())
}
