//! # Trip Client
//!
//! Command-line client for the relay. Plays a 16 kHz WAV file into the relay
//! as if it were a microphone, prints the transcript and trips as they
//! arrive, and saves the synthesized reply to a WAV file.
//!
//! ```text
//! trip-client --origin http://127.0.0.1:8080 --input question.wav --output reply.wav
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voice_trip_relay::client::{ws_url_for_origin, ClientSession, ClientTransport, FrameCapture, PacedRecorder};
use voice_trip_relay::protocol::ServerEnvelope;

#[derive(Parser, Debug)]
#[command(name = "trip-client", version, about = "Talk to the voice trip relay from a WAV file")]
struct Args {
    /// Origin the relay is served from
    #[arg(long, value_name = "URL", default_value = "http://127.0.0.1:8080")]
    origin: String,

    /// 16 kHz WAV file to send as microphone input
    #[arg(long, short, value_name = "PATH")]
    input: PathBuf,

    /// Where to save the synthesized reply
    #[arg(long, short, value_name = "PATH", default_value = "reply.wav")]
    output: PathBuf,

    /// How long to keep listening after the input has been sent
    #[arg(long, value_name = "SECONDS", default_value = "20")]
    listen_secs: u64,

    /// Silence appended to the input so the end of speech is detected
    #[arg(long, value_name = "MS", default_value = "1500")]
    trailing_silence_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing()?;
    let args = Args::parse();

    let _ = rustls::crypto::ring::default_provider().install_default();

    let url = ws_url_for_origin(&args.origin)?;
    let capture = FrameCapture::from_wav_file(&args.input)?
        .with_trailing_silence(Duration::from_millis(args.trailing_silence_ms));
    let run_time = capture.duration() + Duration::from_secs(args.listen_secs);

    let (recorder, mut playback_finished) = PacedRecorder::new();
    let mut session = ClientSession::new(ClientTransport::new(), recorder);
    let mut inbound = session.connect(&url).await?;
    session.start_capture(capture);

    let deadline = tokio::time::sleep(run_time);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            envelope = inbound.recv() => {
                let Some(envelope) = envelope else {
                    info!("Relay closed the connection");
                    break;
                };
                print_envelope(&envelope);
                session.dispatch(envelope);
            }
            Some(()) = playback_finished.recv() => session.on_playback_finished(),
            _ = &mut deadline => {
                info!("Listening time is over");
                break;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.disconnect();
    session.playback().sink().write_wav(&args.output)?;

    println!("\n{} trip(s) stored on the relay:", session.trips().len());
    for (index, trip) in session.trips().iter().enumerate() {
        println!(
            "  {}. {} | {} -> {} | {} | {}{}",
            index + 1,
            trip.client,
            trip.driver,
            trip.destination,
            trip.trip_type,
            trip.date,
            trip.origin.as_deref().map(|o| format!(" | from {}", o)).unwrap_or_default()
        );
    }
    Ok(())
}

fn print_envelope(envelope: &ServerEnvelope) {
    match envelope {
        ServerEnvelope::Status { message } => println!("[status] {}", message),
        ServerEnvelope::Log { message } => println!("{}", message),
        ServerEnvelope::TripsUpdate { trips } => println!("[trips] {} stored", trips.len()),
        ServerEnvelope::Audio { .. } => {}
    }
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_trip_relay=info,trip_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;
    Ok(())
}
