use taufield::metrics::{MetricsRow, MetricsSeries};
use taufield::observer::{FieldStats, MetricsSink, SinkResult, SnapshotRequest, SnapshotSink};
use taufield::params::SimConfig;
use taufield::temporal::{TauProfile, TemporalDiffusion, TemporalDiffusionConfig};
use taufield::{clock::SimulationClock, error::ClockError};

fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h" || args[1] == "help") {
        print_help();
        return;
    }

    let result = match args.get(1).map(String::as_str) {
        None | Some("dynamic-tau") => run_preset(SimConfig::dynamic_tau()),
        Some("resource") => run_preset(SimConfig::resource_coupled()),
        Some("temporal") => {
            run_temporal();
            Ok(())
        }
        Some(other) => {
            eprintln!("Unknown command: {other}");
            print_help();
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn print_help() {
    println!("taufield (tau-modulated Gray-Scott demo)");
    println!("usage:");
    println!("  cargo run");
    println!("  cargo run -- dynamic-tau");
    println!("  cargo run -- resource");
    println!("  cargo run -- temporal");
    println!("  cargo run -- --help");
}

/// Prints each metrics row as it is sampled.
struct MetricsPrinter;

impl MetricsSink for MetricsPrinter {
    fn record(&mut self, row: &MetricsRow) -> SinkResult {
        let cols: Vec<String> = MetricsRow::COLUMNS
            .iter()
            .zip(row.values())
            .map(|(name, v)| format!("{name}={v:.5}"))
            .collect();
        println!("step {:>6}  {}", row.step, cols.join("  "));
        Ok(())
    }

    fn flush(&mut self, series: &MetricsSeries) -> SinkResult {
        println!("{} metrics rows ({})", series.len(), MetricsRow::COLUMNS.join(","));
        Ok(())
    }
}

/// Prints min/max/mean instead of writing images.
struct SnapshotPrinter;

impl SnapshotSink for SnapshotPrinter {
    fn snapshot(&mut self, request: &SnapshotRequest<'_>) -> SinkResult {
        let s = FieldStats::of(request.data);
        let label = if request.is_final { "final" } else { "snapshot" };
        println!(
            "{label} {:<3} step {:>6}  min={:.4} max={:.4} mean={:.4}",
            request.field.name(),
            request.step,
            s.min,
            s.max,
            s.mean
        );
        Ok(())
    }
}

fn run_preset(cfg: SimConfig) -> Result<(), ClockError> {
    let mut clock = SimulationClock::new(cfg)?;
    let summary = clock.run(&mut SnapshotPrinter, &mut MetricsPrinter)?;

    println!(
        "done: {} steps, t={:.2}, clamped={} tau_clamped={} non_finite={}",
        summary.steps,
        summary.sim_time,
        summary.instability.concentrations.clamped,
        summary.instability.tau.clamped,
        summary.instability.non_finite()
    );

    match clock.metadata().to_json_pretty() {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("metadata: {e}"),
    }
    Ok(())
}

fn run_temporal() {
    for profile in [
        TauProfile::Gaussian,
        TauProfile::Linear,
        TauProfile::Sinusoidal,
    ] {
        let cfg = TemporalDiffusionConfig {
            profile,
            ..Default::default()
        };
        let mut sim = match TemporalDiffusion::new(cfg) {
            Ok(sim) => sim,
            Err(e) => {
                eprintln!("{profile:?}: {e}");
                continue;
            }
        };
        let frames = sim.run();
        println!("{profile:?}: dt={:.5}, {} frames", sim.dt(), frames.len());
        for frame in &frames {
            let c = &frame.concentration;
            let (peak_at, peak) = c
                .iter()
                .copied()
                .enumerate()
                .fold((0, f64::MIN), |best, (i, v)| if v > best.1 { (i, v) } else { best });
            println!(
                "  step {:>4}  t={:>8.3}  peak={:.5} at x={:.3}",
                frame.step,
                frame.time,
                peak,
                sim.positions()[peak_at]
            );
        }
    }
}
