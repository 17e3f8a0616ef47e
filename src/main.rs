// src/main.rs

use anyhow::{Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use reprepro_bundle::bundle::Bundle;
use reprepro_bundle::config::{CatalogConfig, DEFAULT_CATALOG};
use reprepro_bundle::control::UpdateParams;
use reprepro_bundle::repository::{DebianSuite, SuiteQuery};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "reprepro-bundle")]
#[command(author, version, about = "Maintain sources control lists and blacklists of reprepro bundles", long_about = None)]
struct Cli {
    /// Project base directory containing repo/bundle
    #[arg(short, long, global = true, default_value = ".")]
    basedir: PathBuf,

    /// Suite catalog (default: <basedir>/.apt-repos/suites.json)
    #[arg(short, long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Update the sources control list of a bundle
    UpdateScl {
        /// Bundle name (<distribution>/<number>)
        bundle: String,
        /// Selector of the bundle's own suite
        #[arg(long, default_value = "bundle:{bundle}")]
        own_suite: String,
        /// Selector of suites packages may be taken from
        #[arg(short, long, default_value = "")]
        supplier: String,
        /// Selector of suites defining the current versions
        #[arg(short, long, default_value = "bundle:{bundle}")]
        reference: String,
        /// Selector of suites whose sources are listed on top
        #[arg(long, default_value = "")]
        highlighted: String,
        /// Selector of suites whose missing sources are added
        #[arg(long, default_value = "")]
        add_from: String,
        /// Selector of suites whose upgrades are taken
        #[arg(long, default_value = "")]
        upgrade_from: String,
        /// Use cached indices instead of refreshing them
        #[arg(long)]
        no_update: bool,
        /// Line written verbatim at the top of the file
        #[arg(long)]
        remark: Option<String>,
    },
    /// Update the binary package blacklist of a bundle
    UpdateBlacklist {
        /// Bundle name (<distribution>/<number>)
        bundle: String,
        /// Selector of the bundle's own suite
        #[arg(long, default_value = "bundle:{bundle}")]
        own_suite: String,
        /// Use cached indices instead of refreshing them
        #[arg(long)]
        no_update: bool,
        /// Line written verbatim at the top of the file
        #[arg(long)]
        remark: Option<String>,
    },
    /// Drop all inactive lines from a bundle's control files
    Normalize {
        /// Bundle name (<distribution>/<number>)
        bundle: String,
    },
    /// Print a field of a bundle's info file
    Info {
        /// Bundle name (<distribution>/<number>)
        bundle: String,
        /// Field name
        #[arg(default_value = "Bundlename")]
        tag: String,
    },
    /// Rewrite Bundlename (and BasedOn) in a bundle's info file
    UpdateInfo {
        /// Bundle name (<distribution>/<number>)
        bundle: String,
        /// Bundle this one is based on
        #[arg(long)]
        based_on: Option<String>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        shell: Shell,
    },
}

/// Suites opened for one command, shared between their roles
struct SuiteSet<'c> {
    bundle: &'c Bundle,
    catalog: &'c CatalogConfig,
    cache_root: PathBuf,
    suites: BTreeMap<String, DebianSuite>,
}

impl<'c> SuiteSet<'c> {
    fn new(bundle: &'c Bundle, catalog: &'c CatalogConfig, basedir: &Path) -> Self {
        Self {
            bundle,
            catalog,
            cache_root: catalog.cache_dir(basedir),
            suites: BTreeMap::new(),
        }
    }

    /// Open every suite matched by `selector` and return their names
    fn open(&mut self, selector: &str) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for definition in self.bundle.select_suites(selector, self.catalog) {
            names.insert(definition.name.clone());
            self.suites
                .entry(definition.name.clone())
                .or_insert_with(|| DebianSuite::new(definition.clone(), &self.cache_root));
        }
        if names.is_empty() && !selector.trim().is_empty() {
            warn!("Selector '{}' matches no suite", self.bundle.substitute(selector));
        }
        names
    }

    fn get(&self, names: &BTreeSet<String>) -> Vec<&dyn SuiteQuery> {
        names
            .iter()
            .filter_map(|name| self.suites.get(name))
            .map(|suite| suite as &dyn SuiteQuery)
            .collect()
    }
}

fn load_catalog(basedir: &Path, catalog: Option<&Path>) -> Result<CatalogConfig> {
    let path = catalog
        .map(Path::to_path_buf)
        .unwrap_or_else(|| basedir.join(DEFAULT_CATALOG));
    Ok(CatalogConfig::load(&path)?)
}

fn open_editable(name: &str, basedir: &Path) -> Result<Bundle> {
    let bundle = Bundle::open(name, basedir)?;
    if !bundle.is_editable()? {
        bail!("Bundle {} is marked ReadOnly", bundle);
    }
    Ok(bundle)
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let basedir = cli.basedir.as_path();

    match cli.command {
        Some(Commands::UpdateScl {
            bundle,
            own_suite,
            supplier,
            reference,
            highlighted,
            add_from,
            upgrade_from,
            no_update,
            remark,
        }) => {
            let catalog = load_catalog(basedir, cli.catalog.as_deref())?;
            let mut bundle = open_editable(&bundle, basedir)?;
            if let Err(e) = bundle.set_own_suite(&own_suite, &catalog) {
                warn!("{}; continuing without own suite", e);
            }

            let mut suites = SuiteSet::new(&bundle, &catalog, basedir);
            let supplier_names = suites.open(&supplier);
            let reference_names = suites.open(&reference);
            let highlighted_suites = suites.open(&highlighted);
            let add_from = suites.open(&add_from);
            let upgrade_from = suites.open(&upgrade_from);

            let params = UpdateParams {
                suppliers: suites.get(&supplier_names),
                references: suites.get(&reference_names),
                highlighted_suites,
                add_from,
                upgrade_from,
                refresh: !no_update,
            };

            let previous = bundle.parse_sources_control_list()?;
            let list = bundle.update_sources_control_list(&params, &previous, remark.as_deref())?;
            println!("Updated sources control list of bundle {}", bundle);
            println!("  Sources: {}", list.len());
            println!("  Active: {}", list.active_records().count());
            Ok(())
        }
        Some(Commands::UpdateBlacklist {
            bundle,
            own_suite,
            no_update,
            remark,
        }) => {
            let catalog = load_catalog(basedir, cli.catalog.as_deref())?;
            let mut bundle = open_editable(&bundle, basedir)?;
            let own = match bundle.set_own_suite(&own_suite, &catalog) {
                Ok(definition) => Some(DebianSuite::new(definition.clone(), &catalog.cache_dir(basedir))),
                Err(e) => {
                    warn!("{}", e);
                    None
                }
            };

            let already = bundle.parse_blacklist()?;
            let blacklist = bundle.update_blacklist(
                own.as_ref().map(|suite| suite as &dyn SuiteQuery),
                &already,
                !no_update,
                remark.as_deref(),
            )?;
            println!("Updated blacklist of bundle {}", bundle);
            println!("  Blacklisted: {}", blacklist.active().len());
            println!("  Proposed: {}", blacklist.proposed().len());
            Ok(())
        }
        Some(Commands::Normalize { bundle }) => {
            let bundle = open_editable(&bundle, basedir)?;
            info!("Normalizing control files of bundle {}", bundle);
            bundle.normalize_sources_control_list()?;
            bundle.normalize_blacklist()?;
            println!("Normalized bundle {}", bundle);
            Ok(())
        }
        Some(Commands::Info { bundle, tag }) => {
            let bundle = Bundle::open(&bundle, basedir)?;
            match bundle.info_tag(&tag)? {
                Some(value) => println!("{}", value),
                None => bail!("No field '{}' in info file of bundle {}", tag, bundle),
            }
            Ok(())
        }
        Some(Commands::UpdateInfo { bundle, based_on }) => {
            let bundle = open_editable(&bundle, basedir)?;
            let path = bundle.update_info_file(based_on.as_deref())?;
            println!("Updated {}", path.display());
            Ok(())
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "reprepro-bundle", &mut io::stdout());
            Ok(())
        }
        None => {
            println!("reprepro-bundle v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'reprepro-bundle --help' for usage information");
            Ok(())
        }
    }
}
