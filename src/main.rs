use anyhow::{Context, Result};
use pipeline_syntax::cli::commands::{CompileCommand, StructureCommand, ValidateCommand};
use pipeline_syntax::cli::output::*;
use pipeline_syntax::cli::{Cli, Command};
use pipeline_syntax::compiler::{generate, GenerateError, GenerateOptions, GeneratedPipeline};
use pipeline_syntax::core::config::PipelineConfig;
use pipeline_syntax::core::Pipeline;
use pipeline_syntax::validation::FieldError;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    let result = match &cli.command {
        Command::Validate(cmd) => validate_pipeline(cmd),
        Command::Compile(cmd) => compile_pipeline(cmd),
        Command::Structure(cmd) => show_structure(cmd),
    };

    if let Err(e) = result {
        report_failure(&e);
        std::process::exit(1);
    }

    Ok(())
}

/// Print a failed command's error, locating validation errors in the document
fn report_failure(e: &anyhow::Error) {
    if let Some(field_error) = e.downcast_ref::<FieldError>() {
        eprintln!("{} Validation failed:", CROSS);
        eprintln!("{}", format_field_error(field_error));
    } else if let Some(generate_error) = e.downcast_ref::<GenerateError>() {
        eprintln!("{} Generation failed:", CROSS);
        eprintln!("  {}", style(generate_error).red());
    } else {
        eprintln!("{} {}", CROSS, style(format!("{:#}", e)).red());
    }
}

fn load_pipeline(file: &str) -> Result<Pipeline> {
    let config = PipelineConfig::from_file(file)
        .with_context(|| format!("Failed to load pipeline from {}", file))?;

    Ok(config.to_pipeline()?)
}

fn generate_pipeline(pipeline: &Pipeline, options: &GenerateOptions) -> Result<GeneratedPipeline> {
    debug!("Generating with run id {}", options.run_id);

    Ok(generate(pipeline, options)?)
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    eprintln!("{} Validating pipeline...", INFO);

    let pipeline = load_pipeline(&cmd.file)?;

    eprintln!("{} Pipeline is valid!", CHECK);
    eprintln!("  Stages: {}", style(pipeline.stage_names().len()).cyan());
    eprintln!("  Tasks: {}", style(pipeline.leaf_count()).cyan());

    if cmd.json {
        let json = serde_json::to_string_pretty(&pipeline)?;
        println!("{}", json);
    }

    Ok(())
}

fn compile_pipeline(cmd: &CompileCommand) -> Result<()> {
    let options = cmd.generate.to_options()?;
    let pipeline = load_pipeline(&cmd.file)?;
    let generated = generate_pipeline(&pipeline, &options)?;

    eprintln!("{}", format_compile_summary(&generated));

    if let Some(dir) = &cmd.output_dir {
        let written = generated
            .write_to_dir(dir)
            .with_context(|| format!("Failed to write documents to {}", dir.display()))?;
        for path in written {
            eprintln!("  {} {}", INFO, style(path.display()).dim());
        }
        return Ok(());
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&generated)?);
    } else {
        let mut documents = vec![serde_yaml::to_string(&generated.graph)?];
        for task in &generated.tasks {
            documents.push(serde_yaml::to_string(task)?);
        }
        documents.push(serde_yaml::to_string(&generated.structure)?);
        print!("{}", documents.join("---\n"));
    }

    Ok(())
}

fn show_structure(cmd: &StructureCommand) -> Result<()> {
    let options = cmd.generate.to_options()?;
    let pipeline = load_pipeline(&cmd.file)?;
    let generated = generate_pipeline(&pipeline, &options)?;

    let tree = generated
        .structure
        .to_tree()
        .context("Generated structure is inconsistent")?;

    println!(
        "{} {}",
        INFO,
        style(&generated.structure.name).bold()
    );
    println!("{}", format_stage_tree(&tree));

    Ok(())
}
