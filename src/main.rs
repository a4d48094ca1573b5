use anyhow::{Context, bail};
use clap::{Arg, Command, value_parser};
use log::{debug, error, info};
use paced_decoder::decoder::{DecodedFrame, FfmpegContext};
use paced_decoder::ivf::IvfReader;
use paced_decoder::pipeline::{ChannelSink, EncodedUnit, OutputKind};
use paced_decoder::{DecoderConfig, DecoderStage};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const CHANNEL_CAPACITY: usize = 8;

fn main() {
    tracing_subscriber::fmt::init();

    let matches = Command::new("decode-ivf")
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Decode an IVF file through a keyframe-gated decoder stage")
        .arg(
            Arg::new("input")
                .value_name("FILE")
                .help("IVF file to decode")
                .required(true),
        )
        .arg(
            Arg::new("fps")
                .short('f')
                .long("fps")
                .value_name("FPS")
                .help("Output rate in frames per second, 0 for synchronous delivery")
                .value_parser(value_parser!(f32)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("KIND")
                .help("Output representation (ycbcr/rgba)")
                .value_parser(value_parser!(OutputKind)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("JSON")
                .help("Decoder configuration file, overridden by --fps and --output"),
        )
        .get_matches();

    let input = matches
        .get_one::<String>("input")
        .cloned()
        .unwrap_or_default();
    let config_path = matches.get_one::<String>("config").cloned();
    let fps = matches.get_one::<f32>("fps").copied();
    let output = matches.get_one::<OutputKind>("output").copied();

    // request a graceful stop on SIGINT, SIGTERM, or SIGHUP
    let cancel = CancellationToken::new();
    let ctrlc_cancel = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || ctrlc_cancel.cancel()) {
        error!("Error setting Ctrl-C handler: {}", e);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(run(input, config_path, fps, output, cancel));
    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(
    input: String,
    config_path: Option<String>,
    fps: Option<f32>,
    output: Option<OutputKind>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let file = File::open(&input).with_context(|| format!("failed to open {}", input))?;
    let mut reader = IvfReader::new(BufReader::new(file))?;
    let header = reader.header().clone();
    let Some(codec) = header.sample_type() else {
        bail!("unsupported IVF codec {}", header.fourcc_str());
    };
    info!(
        "{}: {} {}x{}, {} frames",
        input,
        codec,
        header.width,
        header.height,
        header.frame_count
    );

    let mut config = match config_path {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path))?;
            DecoderConfig::from_json(&json)?
        }
        None => DecoderConfig::default(),
    };
    config.codec = codec;
    if let Some(fps) = fps {
        config.target_fps = fps;
    }
    if let Some(output) = output {
        config.output = output;
    }

    let (sink, mut frames) = ChannelSink::channel(CHANNEL_CAPACITY);
    let stage = DecoderStage::new(
        config,
        Box::new(FfmpegContext::new(codec)),
        Arc::new(sink),
    )?;

    let consumer = tokio::spawn(async move {
        let mut received = 0u64;
        while let Some(sample) = frames.recv().await {
            received += 1;
            match &sample.frame {
                DecodedFrame::YCbCr(img) => debug!(
                    "frame #{} {}x{} ycbcr, luma[0]={}",
                    sample.sequence,
                    img.width(),
                    img.height(),
                    img.y().first().copied().unwrap_or_default()
                ),
                DecodedFrame::Rgba(img) => debug!(
                    "frame #{} {}x{} rgba, px[0]={:?}",
                    sample.sequence,
                    img.width(),
                    img.height(),
                    img.pixels().get(..4)
                ),
            }
        }
        received
    });

    // feed at the nominal file rate so paced output has something to smooth
    let interval = header.frame_interval().unwrap_or(Duration::from_millis(33));
    let mut ticker = tokio::time::interval(interval);

    while let Some(frame) = reader.next_frame()? {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Interrupted, stopping");
                break;
            }
            _ = ticker.tick() => {}
        }

        let pts = frame.pts;
        let unit: EncodedUnit = frame.into_unit(codec);
        if let Err(e) = stage.submit(&unit) {
            if !e.is_recoverable() {
                stage.shutdown();
                return Err(e.into());
            }
            debug!("unit pts={}: {}", pts, e);
        }
    }

    // let the scheduler flush what the codec still holds
    if stage.config().is_async() && !cancel.is_cancelled() {
        tokio::time::sleep(interval * 2).await;
    }

    stage.shutdown();
    stage.join().await;

    let received = consumer.await.context("frame consumer failed")?;
    info!("Received {} frames. {}", received, stage.health().summary());
    Ok(())
}
