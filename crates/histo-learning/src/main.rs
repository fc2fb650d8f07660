//! CLI entry point for the histopathology embedding pipeline.

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use histo_features::{FeatureLabelSet, load_with_label_column, load_with_label_file};
use histo_learning::{
    Artifact, ClassifierKind, EvaluationResult, ReductionMethod, TrainConfig, TrainedPipeline,
    evaluate, visualize,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// CLI-compatible reduction method enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliReduction {
    /// Principal component analysis on scaled features
    Pca,
}

impl From<CliReduction> for ReductionMethod {
    fn from(cli: CliReduction) -> Self {
        match cli {
            CliReduction::Pca => ReductionMethod::Pca,
        }
    }
}

/// CLI-compatible classifier enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliClassifier {
    /// k-nearest-neighbors, neighbor count tuned by cross-validation
    Knn,
    /// Multinomial logistic regression, weight decay tuned by cross-validation
    Logistic,
}

impl From<CliClassifier> for ClassifierKind {
    fn from(cli: CliClassifier) -> Self {
        match cli {
            CliClassifier::Knn => ClassifierKind::Knn,
            CliClassifier::Logistic => ClassifierKind::Logistic,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "histo",
    version,
    about = "PCA and classification for histopathology image embeddings",
    long_about = "Load embedding tables, project them with PCA, train k-NN or logistic \
                  classifiers and evaluate them on held-out data.\n\n\
                  EXAMPLES:\n  \
                  # Validate a CSV and store it as an artifact\n  \
                  histo load --input emb.csv --label-column tissue -o set.json\n\n  \
                  # Pairwise PCA plot of the first three components\n  \
                  histo visualize --input set.json --dimensions 3 -o pca.svg\n\n  \
                  # Train, then evaluate on another cohort\n  \
                  histo train --input train.json --dr-k 2 --model knn -o model.json\n  \
                  histo evaluate --model model.json --input test.json -o results/\n\n  \
                  # Split, train and evaluate in one go\n  \
                  histo run --input emb.csv --label-column tissue --test-fraction 0.25"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output JSON to stdout instead of a human-readable summary
    ///
    /// Disables all logs so stdout can be piped: `... --json | jq .test_accuracy`
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate features and labels and write a feature-set artifact
    Load {
        #[command(flatten)]
        input: InputArgs,

        /// Where to write the artifact
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Plot a fresh PCA projection coloured by label
    Visualize {
        #[command(flatten)]
        input: InputArgs,

        /// Number of components to show (2 = scatter, 3..=10 = pairs matrix)
        #[arg(short, long, default_value = "2")]
        dimensions: usize,

        #[arg(long, value_enum, default_value = "pca")]
        method: CliReduction,

        /// SVG output path
        #[arg(short, long, default_value = "pca.svg")]
        output: PathBuf,

        /// Also write the projected coordinates as CSV
        #[arg(long)]
        coordinates: Option<PathBuf>,
    },

    /// Fit reducer and classifier and write a pipeline artifact
    Train {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        training: TrainingArgs,

        /// Where to write the pipeline artifact
        #[arg(short, long, default_value = "model.json")]
        output: PathBuf,
    },

    /// Score a trained pipeline on labelled data
    Evaluate {
        /// Pipeline artifact written by `histo train`
        #[arg(short, long)]
        model: PathBuf,

        #[command(flatten)]
        input: InputArgs,

        /// Directory for the confusion matrix plots
        #[arg(short, long, default_value = "./outputs")]
        output: PathBuf,
    },

    /// Split one labelled set, train on one part and evaluate on the other
    Run {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        training: TrainingArgs,

        /// Share of each class held out for testing
        #[arg(long, default_value = "0.25")]
        test_fraction: f64,

        /// Directory for the model artifact and plots
        #[arg(short, long, default_value = "./outputs")]
        output: PathBuf,
    },
}

/// Where the feature/label set comes from.
#[derive(Args, Debug)]
struct InputArgs {
    /// Feature-set artifact (.json) or feature table (.csv / .tsv)
    #[arg(short, long)]
    input: PathBuf,

    /// Separate single-column label file (tables only)
    #[arg(long, conflicts_with = "label_column")]
    labels: Option<PathBuf>,

    /// Column of the feature table holding the labels (tables only)
    #[arg(long)]
    label_column: Option<String>,
}

#[derive(Args, Debug)]
struct TrainingArgs {
    /// Number of principal components to keep
    #[arg(long, default_value = "2")]
    dr_k: usize,

    #[arg(long, value_enum, default_value = "pca")]
    method: CliReduction,

    #[arg(long, value_enum, default_value = "knn")]
    model: CliClassifier,

    /// Cross-validation folds for hyperparameter selection
    #[arg(long, default_value = "10")]
    cv_folds: usize,

    /// Number of hyperparameter candidates
    #[arg(long, default_value = "10")]
    tune_length: usize,

    /// Seed for fold assignment and splitting
    #[arg(long, default_value = "42")]
    seed: u64,
}

impl TrainingArgs {
    fn to_config(&self) -> Result<TrainConfig> {
        Ok(TrainConfig::builder()
            .reduction(self.method.into())
            .dr_k(self.dr_k)
            .classifier(self.model.into())
            .cv_folds(self.cv_folds)
            .tune_length(self.tune_length)
            .random_seed(self.seed)
            .build()?)
    }
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.quiet, cli.json);

    match &cli.command {
        Command::Load { input, output } => {
            let set = read_input(input)?;
            Artifact::from(set.clone()).save(output)?;
            info!("Feature set written to: {}", output.display());

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "samples": set.n_samples(),
                        "features": set.n_features(),
                        "levels": set.labels().map(|l| l.levels().to_vec()),
                        "output": output,
                    }))?
                );
            } else {
                println!(
                    "Loaded {} sample(s) x {} feature(s){}",
                    set.n_samples(),
                    set.n_features(),
                    set.labels()
                        .map(|l| format!(", labels: {}", l.levels().join(", ")))
                        .unwrap_or_default()
                );
            }
        }

        Command::Visualize {
            input,
            dimensions,
            method,
            output,
            coordinates,
        } => {
            let set = read_input(input)?;
            let plot = visualize(&set, *dimensions, (*method).into())?;
            plot.save_svg(output)?;
            info!("Plot written to: {}", output.display());

            if let Some(path) = coordinates
                && plot.save_coordinates(path)?
            {
                info!("Coordinates written to: {}", path.display());
            }

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "plot": plot.kind(),
                        "title": plot.title(),
                        "output": output,
                    }))?
                );
            } else {
                println!("{} written to {}", plot.kind(), output.display());
            }
        }

        Command::Train {
            input,
            training,
            output,
        } => {
            let set = read_input(input)?;
            let pipeline = TrainedPipeline::train(&set, &training.to_config()?)?;
            pipeline.save(output)?;
            info!("Pipeline written to: {}", output.display());
            print_training_summary(&pipeline, cli.json)?;
        }

        Command::Evaluate {
            model,
            input,
            output,
        } => {
            let pipeline = TrainedPipeline::load(model)
                .with_context(|| format!("Failed to read pipeline from {}", model.display()))?;
            let set = read_input(input)?;
            let result = evaluate(&pipeline, &set)?;
            result.save_plots(output)?;
            print_evaluation(&result, output, cli.json)?;
        }

        Command::Run {
            input,
            training,
            test_fraction,
            output,
        } => {
            let set = read_input(input)?;
            let (train, test) = set.train_test_split(*test_fraction, training.seed)?;
            let pipeline = TrainedPipeline::train(&train, &training.to_config()?)?;

            std::fs::create_dir_all(output)?;
            let model_path = output.join("model.json");
            pipeline.save(&model_path)?;
            info!("Pipeline written to: {}", model_path.display());

            let result = evaluate(&pipeline, &test)?;
            result.save_plots(output)?;
            if !cli.json {
                print_training_summary(&pipeline, false)?;
            }
            print_evaluation(&result, output, cli.json)?;
        }
    }

    Ok(())
}

/// Resolve `--input` to a feature set, from an artifact or a table.
fn read_input(args: &InputArgs) -> Result<FeatureLabelSet> {
    if !args.input.exists() {
        return Err(anyhow!("Input file not found: {}", args.input.display()));
    }

    if is_artifact(&args.input) {
        if args.labels.is_some() || args.label_column.is_some() {
            return Err(anyhow!(
                "--labels/--label-column only apply to table inputs, not {}",
                args.input.display()
            ));
        }
        debug!("Reading artifact {}", args.input.display());
        return Ok(Artifact::load(&args.input)?.into_feature_set()?);
    }

    let set = match &args.labels {
        Some(labels) => load_with_label_file(&args.input, labels)?,
        None => load_with_label_column(&args.input, args.label_column.as_deref())?,
    };
    Ok(set)
}

fn is_artifact(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

fn print_training_summary(pipeline: &TrainedPipeline, json_output: bool) -> Result<()> {
    let profile = pipeline.classifier().profile();

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "reduction": pipeline.reduction_method(),
                "classifier": pipeline.classifier_kind(),
                "requested_dim": pipeline.requested_dim(),
                "k": pipeline.k(),
                "tuned_parameter": profile.parameter,
                "tuned_value": profile.best_candidate(),
                "cv_accuracy": profile.best_accuracy(),
                "train_accuracy": pipeline.train_accuracy(),
            }))?
        );
        return Ok(());
    }

    println!("\n{}", "=".repeat(60));
    println!("TRAINING SUMMARY");
    println!("{}", "=".repeat(60));
    println!(
        "  Reduction:       {} ({} of {} requested component(s))",
        pipeline.reduction_method(),
        pipeline.k(),
        pipeline.requested_dim()
    );
    println!("  Classifier:      {}", pipeline.classifier_kind());
    println!(
        "  Selected:        {} = {} (CV accuracy {:.3})",
        profile.parameter,
        profile.best_candidate(),
        profile.best_accuracy()
    );
    println!("  Train accuracy:  {:.3}", pipeline.train_accuracy());
    println!();
    print!("{}", pipeline.train_confusion());
    Ok(())
}

fn print_evaluation(result: &EvaluationResult, output: &Path, json_output: bool) -> Result<()> {
    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "train_accuracy": result.train_accuracy,
                "test_accuracy": result.test_accuracy,
                "train_confusion": result.train_confusion,
                "test_confusion": result.test_confusion,
                "plots": output,
            }))?
        );
        return Ok(());
    }

    println!("\n{}", "=".repeat(60));
    println!("EVALUATION");
    println!("{}", "=".repeat(60));
    println!("  Train accuracy:  {:.3}", result.train_accuracy);
    println!("  Test accuracy:   {:.3}", result.test_accuracy);
    println!();
    println!("Test confusion (rows = predicted, columns = true):");
    print!("{}", result.test_confusion);
    println!("\nPlots written to {}", output.display());
    Ok(())
}
