use std::env;
use std::fs;

use tools::{MapConfig, simulate};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = real_main() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<(), String> {
    let mut args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        return Err(usage());
    }

    let cmd = args[1].clone();
    args.drain(0..2);

    match cmd.as_str() {
        "fly" => cmd_fly(args),
        "check" => cmd_check(args),
        _ => Err(usage()),
    }
}

fn load_config(path: &str) -> Result<MapConfig, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("read {path:?}: {e}"))?;
    MapConfig::from_json_str(&text)
}

fn cmd_check(args: Vec<String>) -> Result<(), String> {
    // avmap check <map.json>
    let [path] = args.as_slice() else {
        return Err(usage());
    };
    let config = load_config(path)?;
    println!(
        "ok: {}x{} window, {} route points, {} facilities",
        config.window[0],
        config.window[1],
        config.route.len(),
        config.facilities.len()
    );
    Ok(())
}

fn cmd_fly(args: Vec<String>) -> Result<(), String> {
    // avmap fly <map.json> [--frames N] [--track-up]
    let mut config = load_config(&args[0])?;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--frames" => {
                i += 1;
                let value = args.get(i).ok_or("--frames requires a value")?;
                config.flight.max_frames = value.parse().map_err(|_| format!("bad --frames: {value}"))?;
            }
            "--track-up" => config.flight.track_up = true,
            other => return Err(format!("unknown arg: {other}\n\n{}", usage())),
        }
        i += 1;
    }

    let report = simulate(&config)?;
    let json = serde_json::to_string_pretty(&report).map_err(|e| format!("encode report: {e}"))?;
    println!("{json}");
    Ok(())
}

fn usage() -> String {
    let exe = env::args().next().unwrap_or_else(|| "avmap".to_string());
    format!(
        "Usage:\n  {exe} check <map.json>\n  {exe} fly <map.json> [--frames N] [--track-up]\n\nNotes:\n- Set RUST_LOG=debug for per-frame layer decisions.\n- `fly` prints a JSON report of the final frame.\n"
    )
}
