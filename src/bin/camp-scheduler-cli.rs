#![forbid(unsafe_code)]
use anyhow::{Context, Result};
use camp_scheduler::{
    pipeline::{self, RunRequest, Stage},
    sample::{self, SampleOptions},
    scheduler::util::{parse_form_date, WeekCalendar},
};
use chrono::{Datelike, Local, Weekday};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
#[cfg(feature = "logging")]
use tracing_subscriber::{fmt::Subscriber, EnvFilter};

/// Planification hebdomadaire du camp (congés, temps libre, skills, campeurs)
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Active les logs (feature `logging`)
    #[arg(long, global = true)]
    log: bool,

    /// Répertoire des fichiers d'entrée
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Racine des répertoires de sortie horodatés
    #[arg(long, global = true, default_value = "Output")]
    out_dir: PathBuf,

    /// Lundi de la semaine, DD/MM/YYYY (défaut : lundi prochain)
    #[arg(long, global = true)]
    week_start: Option<String>,

    /// Graine du générateur aléatoire
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Attribuer les jours et nuits de congé
    TimeOff,

    /// Affecter les lieux de temps libre
    Locations {
        /// `day_off_results.csv` d'un run précédent
        #[arg(long)]
        time_off_results: Option<PathBuf>,
    },

    /// Construire les modèles de skills et la couverture
    Skills,

    /// Inscrire les campeurs
    Campers {
        /// Multiplicateur du seuil de viabilité
        #[arg(long)]
        viability: Option<u32>,
    },

    /// Exécuter toutes les étapes
    Full,

    /// Exécuter toutes les étapes et vérifier les invariants
    Check,

    /// Générer un jeu de données d'exemple
    Sample {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long, default_value_t = 60)]
        staff: usize,
        #[arg(long, default_value_t = 150)]
        campers: usize,
    },
}

fn week_from(arg: Option<&str>) -> Result<WeekCalendar> {
    let Some(raw) = arg else {
        return Ok(WeekCalendar::upcoming());
    };
    let start = parse_form_date(raw).with_context(|| format!("invalid week start: {raw}"))?;
    if start.weekday() != Weekday::Mon {
        eprintln!("Warning: week start {raw} is not a Monday");
    }
    Ok(WeekCalendar::new(start))
}

fn main() {
    let cli = Cli::parse();

    #[cfg(feature = "logging")]
    if cli.log {
        let _ = Subscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }

    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            1
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let week = week_from(cli.week_start.as_deref())?;
    let mut request = RunRequest::new(&cli.data_dir, &cli.out_dir, week);
    request.seed = cli.seed;
    let check = matches!(cli.cmd, Commands::Check);

    let stage = match cli.cmd {
        Commands::Sample {
            dir,
            staff,
            campers,
        } => {
            let opts = SampleOptions {
                staff,
                campers,
                week,
            };
            let mut rng = match cli.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let data = sample::generate(&opts, &mut rng);
            sample::write_sample(&dir, &data)?;
            println!(
                "Sample data written to {} ({} staff, {} campers)",
                dir.display(),
                data.roster.len(),
                data.campers.len()
            );
            return Ok(0);
        }
        Commands::TimeOff => Stage::TimeOff,
        Commands::Locations { time_off_results } => {
            request.time_off_results = time_off_results;
            Stage::Locations
        }
        Commands::Skills => Stage::Skills,
        Commands::Campers { viability } => {
            request.viability = viability;
            Stage::Campers
        }
        Commands::Full | Commands::Check => Stage::Full,
    };

    let report = pipeline::run(stage, &request, Local::now().naive_local())?;
    println!(
        "Week of {}: outputs in {}",
        week.start().format("%d/%m/%Y"),
        report.dir.display()
    );
    if !check {
        return Ok(0);
    }
    if report.violations.is_empty() {
        println!("OK: no violations");
        Ok(0)
    } else {
        eprintln!("Found {} violation(s)", report.violations.len());
        for v in &report.violations {
            eprintln!("  {v}");
        }
        // Code 2 = WARNING/INCOMPLETE
        Ok(2)
    }
}
