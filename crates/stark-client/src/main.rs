//! starkcat: publish envelopes from stdin and print envelopes from a Stark bus.
//!
//! Usage: `starkcat [-v] [-n N] [-t DURATION] [ACTION[:DEVICE]...]`
//! - Config is read from `$STARK_CONFIG` (default `stark.yaml`)
//! - Every ACTION is subscribed; `ping:self` scopes it to a device, a bare
//!   action also subscribes for this device. No ACTION means everything
//!   addressed to this device.
//! - JSON envelopes on stdin are published one by one
//! - Inbound envelopes are printed as JSON lines on stdout
//! - `-n N` exits after N envelopes (-1: never), `-t` after a duration
//!   (default 2s, negative: never, 0: right away)
//!
//! Examples:
//! - `echo '{"action":"ping"}' | starkcat` publishes and waits 2s for replies
//! - `starkcat -n 1 -t -1s ping` waits for the next global ping

use std::env;
use std::io;
use std::thread;
use std::time::Duration;

use stark_client::{config, ClientEvent, StarkClient};
use stark_core::error::{Result, StarkError};
use stark_core::protocol::SELF_ALIAS;
use stark_core::Envelope;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

const USAGE: &str = "usage: starkcat [-v] [-n N] [-t DURATION] [ACTION[:DEVICE]...]";

/// When to stop waiting for envelopes.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Timeout {
    Immediate,
    After(Duration),
    Never,
}

#[derive(Debug, PartialEq)]
struct Subscription {
    action: String,
    device: String,
}

impl Subscription {
    /// `action` or `action:device`.
    fn parse(raw: &str) -> Self {
        let (action, device) = raw.split_once(':').unwrap_or((raw, ""));
        Self {
            action: action.to_string(),
            device: device.to_string(),
        }
    }
}

#[derive(Debug, PartialEq)]
struct Args {
    help: bool,
    verbose: bool,
    /// Envelopes to print before exiting; `None` waits indefinitely.
    wait_num: Option<u64>,
    timeout: Timeout,
    subscriptions: Vec<Subscription>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            help: false,
            verbose: false,
            wait_num: None,
            timeout: Timeout::After(Duration::from_secs(2)),
            subscriptions: Vec::new(),
        }
    }
}

/// Flags come first; the first positional argument (or `--`) ends them.
fn parse_args(mut it: impl Iterator<Item = String>) -> Result<Args> {
    let mut args = Args::default();
    while let Some(a) = it.next() {
        if a == "--" {
            args.subscriptions.extend(it.by_ref().map(|s| Subscription::parse(&s)));
            break;
        }
        if !a.starts_with('-') || a == "-" {
            args.subscriptions.push(Subscription::parse(&a));
            args.subscriptions.extend(it.by_ref().map(|s| Subscription::parse(&s)));
            break;
        }

        let (flag, inline) = match a.split_once('=') {
            Some((flag, value)) => (flag, Some(value.to_string())),
            None => (a.as_str(), None),
        };
        let mut value = |name: &str| {
            inline
                .clone()
                .or_else(|| it.next())
                .ok_or_else(|| StarkError::BadRequest(format!("{name} needs a value")))
        };
        match flag.trim_start_matches('-') {
            "h" | "help" => args.help = true,
            "v" => args.verbose = true,
            "n" => {
                let raw = value("-n")?;
                let n: i64 = raw
                    .parse()
                    .map_err(|_| StarkError::BadRequest(format!("-n: invalid count {raw:?}")))?;
                args.wait_num = u64::try_from(n).ok();
            }
            "t" => args.timeout = parse_timeout(&value("-t")?)?,
            other => return Err(StarkError::BadRequest(format!("unknown flag -{other}"))),
        }
    }

    if args.subscriptions.is_empty() {
        args.subscriptions.push(Subscription {
            action: String::new(),
            device: SELF_ALIAS.to_string(),
        });
    }
    Ok(args)
}

/// Durations like `2s`, `1m30s`, `500ms`, `-1s`.
fn parse_timeout(raw: &str) -> Result<Timeout> {
    let bad = || StarkError::BadRequest(format!("-t: invalid duration {raw:?}"));
    let (negative, body) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    if body == "0" {
        return Ok(Timeout::Immediate);
    }
    if body.is_empty() {
        return Err(bad());
    }

    let is_num = |c: char| c.is_ascii_digit() || c == '.';
    let mut secs = 0f64;
    let mut rest = body;
    while !rest.is_empty() {
        let num_len = rest.find(|c: char| !is_num(c)).unwrap_or(rest.len());
        if num_len == 0 {
            return Err(bad());
        }
        let value: f64 = rest[..num_len].parse().map_err(|_| bad())?;
        rest = &rest[num_len..];

        let unit_len = rest.find(is_num).unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return Err(bad()),
        };
        secs += value * scale;
        rest = &rest[unit_len..];
    }

    Ok(if secs <= 0.0 {
        Timeout::Immediate
    } else if negative {
        Timeout::Never
    } else {
        Timeout::After(Duration::from_secs_f64(secs))
    })
}

#[tokio::main]
async fn main() {
    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}\n{USAGE}");
            std::process::exit(2);
        }
    };
    if args.help {
        println!("{USAGE}");
        return;
    }

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    fmt().with_env_filter(filter).with_writer(io::stderr).init();

    if let Err(e) = run(args).await {
        tracing::error!(error = %e, code = e.code().as_str(), "starkcat failed");
        std::process::exit(1);
    }
}

/// Decode a stream of JSON envelopes from stdin on a plain thread; the
/// process may exit while it is still blocked on a read.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<Result<Envelope>> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || {
        let stdin = io::stdin().lock();
        for item in serde_json::Deserializer::from_reader(stdin).into_iter::<Envelope>() {
            let item = item.map_err(|e| StarkError::Decode(format!("stdin: {e}")));
            let failed = item.is_err();
            if tx.send(item).is_err() || failed {
                break;
            }
        }
    });
    rx
}

async fn run(args: Args) -> Result<()> {
    let path = env::var("STARK_CONFIG").unwrap_or_else(|_| "stark.yaml".to_string());
    let cfg = config::load_from_file(&path)?;

    let (client, mut events) = StarkClient::new(&cfg);
    tracing::info!(device = %client.device_id(), url = %cfg.client.stream_url(), "starkcat starting");

    // queued until the channel opens
    for sub in &args.subscriptions {
        client.subscribe(&sub.action, &sub.device)?;
    }
    client.connect()?;

    if args.wait_num == Some(0) || args.timeout == Timeout::Immediate {
        return client.close();
    }

    let mut input = spawn_stdin_reader();
    let mut input_open = true;
    let mut remaining = args.wait_num;

    let deadline = async {
        match args.timeout {
            Timeout::After(d) => tokio::time::sleep(d).await,
            Timeout::Immediate | Timeout::Never => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            ev = events.recv() => {
                match ev {
                    Some(ClientEvent::Open) => tracing::info!("channel open"),
                    Some(ClientEvent::Message(env)) => {
                        println!("{}", env.encode()?);
                        if let Some(n) = remaining.as_mut() {
                            *n = n.saturating_sub(1);
                            if *n == 0 {
                                break;
                            }
                        }
                    }
                    Some(ClientEvent::Close) | None => break,
                }
            }
            item = input.recv(), if input_open => {
                match item {
                    Some(env) => client.publish(env?)?,
                    None => input_open = false,
                }
            }
            _ = &mut deadline => {
                tracing::debug!("timeout reached");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    client.close()?;
    if args.verbose {
        eprint!("{}", client.metrics().render());
    }
    Ok(())
}
