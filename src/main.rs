use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use evograph::catalog::{DirectoryCatalog, GenomeCatalog};
use evograph::config::{AppConfig, ConfigManager};
use evograph::{deserialize_genome, serialize_genome, Genome, LineageCounter, Operator};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "evograph", version, about = "Structural edits on neural architecture genomes")]
struct Cli {
    /// TOML configuration; EVOGRAPH__* environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cross two genomes
    Breed {
        recipient: PathBuf,
        donor: PathBuf,
        #[arg(long, value_enum, default_value_t = Strategy::Insert)]
        strategy: Strategy,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Apply one mutation
    Mutate {
        genome: PathBuf,
        #[arg(long, value_enum)]
        op: Mutation,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print flash, RAM and MAC totals
    Resources { genome: PathBuf },
    /// Check that a genome parses and is structurally sound
    Validate { genome: PathBuf },
    /// Print the effective configuration
    Config,
    /// Manage the genome catalog
    #[command(subcommand)]
    Catalog(CatalogCommand),
}

#[derive(Subcommand)]
enum CatalogCommand {
    Save {
        genome: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    List,
    Show { id: String },
    Delete { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    Insert,
    Replace,
    Neat,
    Multi,
}

impl From<Strategy> for Operator {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Insert => Operator::Breed,
            Strategy::Replace => Operator::BreedByReplacement,
            Strategy::Neat => Operator::BreedNeatStyle,
            Strategy::Multi => Operator::BreedMultiPoint,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Mutation {
    Remove,
    Add,
    Skip,
    Change,
    Params,
}

impl From<Mutation> for Operator {
    fn from(mutation: Mutation) -> Self {
        match mutation {
            Mutation::Remove => Operator::RemoveNode,
            Mutation::Add => Operator::AddNode,
            Mutation::Skip => Operator::AddSkipConnection,
            Mutation::Change => Operator::ChangeLayerType,
            Mutation::Params => Operator::MutateParameters,
        }
    }
}

fn read_genome(path: &Path, lineage: &LineageCounter) -> anyhow::Result<Genome> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    deserialize_genome(&text, lineage).with_context(|| format!("parsing {}", path.display()))
}

fn emit(text: &str, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => fs::write(path, text).with_context(|| format!("writing {}", path.display())),
        None => {
            print!("{}", text);
            Ok(())
        }
    }
}

fn run_operator(
    operator: Operator,
    recipient: &Genome,
    donor: &Genome,
    config: &AppConfig,
    lineage: &LineageCounter,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let mut rng = match config.search.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let Some(offspring) = operator.apply(recipient, donor, config, lineage, &mut rng) else {
        bail!("{:?} produced no offspring", operator);
    };
    info!(
        "{:?}: {} nodes, valid = {}",
        operator,
        offspring.genome.node_count(),
        offspring.is_valid
    );
    emit(&serialize_genome(&offspring.genome)?, out)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let manager = ConfigManager::new();
    manager.load_layered(cli.config.as_deref())?;
    let config = manager.get();
    let lineage = LineageCounter::new();

    match cli.command {
        Commands::Breed {
            recipient,
            donor,
            strategy,
            out,
        } => {
            let recipient = read_genome(&recipient, &lineage)?;
            let donor = read_genome(&donor, &lineage)?;
            run_operator(strategy.into(), &recipient, &donor, &config, &lineage, out.as_deref())?;
        }
        Commands::Mutate { genome, op, out } => {
            let genome = read_genome(&genome, &lineage)?;
            run_operator(op.into(), &genome, &genome, &config, &lineage, out.as_deref())?;
        }
        Commands::Resources { genome } => {
            let genome = read_genome(&genome, &lineage)?;
            let resources = genome.resources(config.search.dtype_bytes);
            println!("{}", serde_json::to_string_pretty(&resources)?);
        }
        Commands::Validate { genome } => {
            let genome = read_genome(&genome, &lineage)?;
            let graph = genome.graph();
            println!("nodes:      {}", genome.node_count());
            println!("frontiers:  {} in, {} out", genome.input_frontier().len(), genome.output_frontier().len());
            println!("acyclic:    {}", graph.is_acyclic());
            println!("shapes:     {}", if graph.shapes_are_fresh() { "consistent" } else { "stale" });
            if !genome.is_valid() {
                bail!("genome has no input or output frontier");
            }
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            for manifest in config.manifests() {
                println!("[{}] {} fields", manifest.section, manifest.fields.len());
            }
        }
        Commands::Catalog(command) => {
            let catalog = DirectoryCatalog::from_config(&config.catalog);
            match command {
                CatalogCommand::Save { genome, name, tags } => {
                    let text = fs::read_to_string(&genome).with_context(|| format!("reading {}", genome.display()))?;
                    // Refuse to store anything that would not load back
                    deserialize_genome(&text, &lineage)?;
                    let entry = catalog.save(&text, &name, &tags)?;
                    println!("{}", entry.id);
                }
                CatalogCommand::List => {
                    for entry in catalog.list()? {
                        println!(
                            "{}  {:<24} {:>4} nodes  {}",
                            entry.id,
                            entry.name,
                            entry.summary.total_nodes,
                            entry.tags.join(",")
                        );
                    }
                }
                CatalogCommand::Show { id } => print!("{}", catalog.load(&id)?),
                CatalogCommand::Delete { id } => catalog.delete(&id)?,
            }
        }
    }

    Ok(())
}
