use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use clap::error::ErrorKind;
use clap::Parser;

use delta_sssp::delta_stepper::DeltaStepper;
use delta_sssp::error::SsspError;
use delta_sssp::graph_store::INF;
use delta_sssp::logger::RankLogger;
use delta_sssp::options::Cli;
use delta_sssp::parse_data::{self, LoadedGraph};
use delta_sssp::transport::{LamellarTransport, Transport};
use run_record::RunRecord;

fn main() {
    let world = lamellar::LamellarWorldBuilder::new().build();
    let my_pe = world.my_pe();
    let num_pes = world.num_pes();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                if my_pe == 0 {
                    print!("{err}");
                }
                std::process::exit(0);
            }
            _ => {
                if my_pe == 0 {
                    eprintln!("{err}");
                }
                std::process::exit(1);
            }
        },
    };

    if let Err(err) = run(world, my_pe, num_pes, &cli) {
        eprintln!("rank {my_pe}: FATAL {err}");
        std::process::exit(err.exit_code());
    }
}

fn run(
    world: lamellar::LamellarWorld,
    my_pe: usize,
    num_pes: usize,
    cli: &Cli,
) -> Result<(), SsspError> {
    if cli.delta <= 0 {
        return Err(SsspError::Config(format!(
            "delta must be positive, got {}",
            cli.delta
        )));
    }
    if my_pe == 0 {
        cli.describe();
    }

    let output_path = cli.output_for(my_pe);
    let log_path = PathBuf::from(format!("{}.log", output_path.display()));
    let mut logger = RankLogger::create(&log_path, cli.logging, my_pe)?;

    let start_load = Instant::now();
    let LoadedGraph {
        dist,
        store: mut graph,
    } = parse_data::load_graph_file(&cli.input_for(my_pe), my_pe, num_pes, cli.assume_nomultiedge)?;

    let mut transport = LamellarTransport::new(world, graph.n_owned(), INF);

    // every rank must have read the same vertex count
    let n = graph.n_global() as i64;
    if transport.allreduce_min_i64(n) != n || transport.allreduce_sum_i64(n) != n * num_pes as i64 {
        return Err(SsspError::Data(format!(
            "rank {my_pe} read {n} vertices but the world disagrees"
        )));
    }

    logger.progress(&format!(
        "loaded {} owned vertices of {} in {:?}",
        graph.n_owned(),
        graph.n_global(),
        start_load.elapsed(),
    ));

    transport.barrier();
    let time_to_load = start_load.elapsed();
    let start_solve = Instant::now();

    let stats = {
        let mut stepper = DeltaStepper::new(
            &mut graph,
            &dist,
            &mut transport,
            &mut logger,
            cli.delta,
            cli.policy(),
            cli.progress_freq,
        )?;
        stepper.run(cli.root)?
    };

    transport.barrier();
    let time_to_solve = start_solve.elapsed();

    let mut out = BufWriter::new(File::create(&output_path)?);
    for &d in graph.distances() {
        if d == INF {
            writeln!(out, "-1")?;
        } else {
            writeln!(out, "{d}")?;
        }
    }
    out.flush()?;

    if my_pe == 0 {
        println!();
        println!("Finished successfully");
        println!();
        println!("Number of PE's:             {num_pes}");
        println!("Vertices:                   {}", graph.n_global());
        println!("Owned by rank 0:            {}", graph.n_owned());
        println!("Delta:                      {}", cli.delta);
        println!("Epochs:                     {}", stats.epochs);
        println!("Phases:                     {}", stats.phases);
        println!();
        println!("Time to load graph:         {time_to_load:?}");
        println!("Time to get shortest paths: {time_to_solve:?}");
    }

    if let Some(record_path) = &cli.record_file {
        if my_pe == 0 {
            let mut record = RunRecord::new("sssp_delta_step", my_pe, num_pes);
            record.with_output("vertices", graph.n_global().to_string());
            record.with_output("delta", cli.delta.to_string());
            record.with_output("root", cli.root.to_string());
            record.with_output("epochs", stats.epochs.to_string());
            record.with_output("phases", stats.phases.to_string());
            record.with_output("relaxations", stats.relaxations.to_string());
            record.with_output("updates", stats.updates.to_string());
            record.with_output("load_secs", format!("{:.6}", time_to_load.as_secs_f64()));
            record.with_output("solve_secs", format!("{:.6}", time_to_solve.as_secs_f64()));
            record.write(record_path);
        }
    }

    Ok(())
}
