/*!
 * pipework - Main Entry Point
 *
 * Usage:
 *   pipework exchange            two-way exchange with a forked worker
 *   pipework scores <pattern>    cat <scores file> | grep <pattern> | sort
 *   pipework run <spec.json>     run a pipeline described in JSON
 */

use std::io;
use tracing::{error, info, warn};

use pipework::core::limits::{EXIT_FAILURE, MAX_MESSAGE_CONTENT};
use pipework::{
    init_tracing, Concat, OperationSpan, OrchestratorConfig, OverallOutcome, PipelineBuilder,
    PipelineSpec, PipeworkError, PipeworkResult, StageSpec, TwoPartyExchange,
};

const USAGE: &str = "usage: pipework exchange | pipework scores <pattern> | pipework run <spec.json>";

fn main() {
    let config = OrchestratorConfig::from_env();
    init_tracing(config.trace_json);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match dispatch(&config, &args) {
        Ok(outcome) => std::process::exit(outcome.exit_code()),
        Err(e) => {
            error!(error = %e, "pipework failed");
            if e.is_oversize() {
                warn!(max = MAX_MESSAGE_CONTENT, "input line exceeds the message bound");
            }
            eprintln!("{:?}", miette::Report::new(e));
            std::process::exit(EXIT_FAILURE);
        }
    }
}

fn dispatch(config: &OrchestratorConfig, args: &[String]) -> PipeworkResult<OverallOutcome> {
    match args {
        [command] if command == "exchange" => exchange(config),
        [command, pattern] if command == "scores" => scores(config, pattern),
        [command, path] if command == "run" => run_spec(path),
        _ => Err(PipeworkError::Usage(USAGE.to_string())),
    }
}

fn exchange(config: &OrchestratorConfig) -> PipeworkResult<OverallOutcome> {
    let op = OperationSpan::new("exchange");
    let _entered = op.enter();

    let exchange = TwoPartyExchange::new(
        Concat::new(config.worker_suffix.as_str()),
        Concat::new(config.coordinator_suffix.as_str()),
    )
    .with_console(config.prompts);

    // Coordinator and worker each read their own line from the terminal.
    // No stdin lock may be held across the fork.
    let mut coordinator_input = io::BufReader::new(io::stdin());
    let mut worker_input = io::BufReader::new(io::stdin());

    let report = exchange
        .run(&mut coordinator_input, &mut worker_input)
        .map_err(|e| {
            op.record_error(&e.to_string());
            e
        })?;

    if !config.prompts {
        println!("{}", report.final_output);
    }
    op.record_result(report.worker.is_success());
    Ok(report.worker)
}

fn scores(config: &OrchestratorConfig, pattern: &str) -> PipeworkResult<OverallOutcome> {
    let spec = PipelineSpec::new(vec![
        StageSpec::new("cat").arg(config.scores_file.to_string_lossy()),
        StageSpec::new("grep").arg(pattern),
        StageSpec::new("sort"),
    ])?;
    run_pipeline("scores", spec)
}

fn run_spec(path: &str) -> PipeworkResult<OverallOutcome> {
    let json = std::fs::read_to_string(path).map_err(|source| PipeworkError::SpecFile {
        path: path.to_string(),
        source,
    })?;
    let spec = PipelineSpec::from_json(&json)?;
    run_pipeline("run", spec)
}

fn run_pipeline(name: &str, spec: PipelineSpec) -> PipeworkResult<OverallOutcome> {
    let op = OperationSpan::new(name);
    let _entered = op.enter();

    let report = PipelineBuilder::new(spec).run()?;
    op.record_result(report.outcome.is_success());
    info!(outcome = %report.outcome, "done");
    Ok(report.outcome)
}
