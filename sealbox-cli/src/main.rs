//! sealbox - encrypted single-file containers with multi-identity access.

mod config;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use sealbox_container::{
    open_support, ContainerEngine, IdentityRegistry, StorageFormat,
};
use sealbox_crypto::KdfParams;
use sealbox_session::{EditSession, IdentityUnlock, PasswordUnlock, UnlockCapability};

use config::Config;

#[derive(Parser)]
#[command(name = "sealbox", version, about = "Encrypted single-file containers, openable by password or SSH identity")]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Container file encoding.
    #[arg(long, value_enum, default_value = "packed", global = true)]
    format: FormatArg,

    /// Alternative configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Json,
    Packed,
}

impl From<FormatArg> for StorageFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => StorageFormat::Json,
            FormatArg::Packed => StorageFormat::Packed,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new empty container.
    New {
        file: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
        /// Master password (prompted when not given).
        #[arg(short = 'm', long = "master-password")]
        master_password: Option<String>,
    },

    /// Encrypt a plain file into a new container.
    Encrypt {
        #[arg(short = 'i', long = "in")]
        input: PathBuf,
        #[arg(short = 'o', long = "out")]
        output: PathBuf,
        #[arg(short, long)]
        force: bool,
        #[arg(short = 'm', long = "master-password")]
        master_password: Option<String>,
    },

    /// Decrypt a container into a plain file.
    Decrypt {
        #[arg(short = 'i', long = "in")]
        input: PathBuf,
        #[arg(short = 'o', long = "out")]
        output: PathBuf,
        #[command(flatten)]
        secret: SecretArgs,
    },

    /// Open a container's plaintext with an external program.
    Open {
        file: PathBuf,
        /// Program to run on the staged plaintext.
        #[arg(short, long, default_value = "nano")]
        program: String,
        #[command(flatten)]
        secret: SecretArgs,
    },

    /// Verify that containers can be decrypted.
    Verify {
        files: Vec<PathBuf>,
        #[command(flatten)]
        secret: SecretArgs,
    },

    /// Manage SSH identities registered on a container.
    Identity {
        #[command(subcommand)]
        command: IdentityCommands,
    },
}

#[derive(Subcommand)]
enum IdentityCommands {
    /// Register a public key; needs the master password.
    Add {
        file: PathBuf,
        /// Public key file to register.
        #[arg(short = 'k', long = "public")]
        public_key: PathBuf,
        /// Auth id (default: the key comment).
        #[arg(short = 'a', long = "auth-id")]
        auth_id: Option<String>,
        #[arg(short = 'm', long = "master-password")]
        master_password: Option<String>,
    },
    /// Remove a registered identity.
    Rm {
        file: PathBuf,
        #[arg(short = 'a', long = "auth-id")]
        auth_id: Option<String>,
    },
    /// List registered identities.
    Ls { file: PathBuf },
}

/// How to unlock a container: master password (default) or SSH identity.
#[derive(Args)]
struct SecretArgs {
    /// Unlock with an SSH private key instead of the master password.
    #[arg(long = "ssh-key")]
    ssh_key: bool,

    /// Master password (prompted when needed and not given).
    #[arg(short = 'm', long = "master-password")]
    master_password: Option<String>,

    /// Private key file (default: the config entry for this container).
    #[arg(short = 'y', long = "key-file")]
    key_file: Option<PathBuf>,

    /// Passphrase of the private key, when it is encrypted.
    #[arg(short = 'K', long = "key-passphrase")]
    key_passphrase: Option<String>,

    /// Auth id to unlock as (default: the config entry).
    #[arg(short = 'a', long = "auth-id")]
    auth_id: Option<String>,
}

/// A fully resolved identity credential.
struct IdentityCredential {
    auth_id: String,
    private_key: String,
    passphrase: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let format: StorageFormat = cli.format.into();
    let params = KdfParams::default();

    match cli.command {
        Commands::New {
            file,
            force,
            master_password,
        } => {
            let password = get_or_confirm_password(master_password)?;
            engine(&file, format).create(&password, force, &params)?;
            println!("{} created", file.display());
            Ok(())
        }

        Commands::Encrypt {
            input,
            output,
            force,
            master_password,
        } => {
            let data = fs::read(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let password = get_or_confirm_password(master_password)?;
            let engine = engine(&output, format);
            engine.create(&password, force, &params)?;
            engine.write(&data, &password, &params)?;
            println!("{} encrypted into {}", input.display(), output.display());
            Ok(())
        }

        Commands::Decrypt {
            input,
            output,
            secret,
        } => {
            let engine = engine(&input, format);
            let data = if secret.ssh_key {
                let credential = resolve_identity(&input, &secret, &config)?;
                IdentityRegistry::new(&engine).read(
                    &credential.auth_id,
                    &credential.private_key,
                    credential.passphrase.as_deref(),
                )?
            } else {
                let password = get_password(secret.master_password)?;
                engine.read(&password, &params)?
            };
            fs::write(&output, data)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("{} decrypted into {}", input.display(), output.display());
            Ok(())
        }

        Commands::Open {
            file,
            program,
            secret,
        } => {
            let capability = build_capability(&file, format, &secret, &config, params)?;
            let report = EditSession::new(capability, &program).run()?;
            tracing::info!(mode = ?report.mode, "session finished");
            Ok(())
        }

        Commands::Verify { files, secret } => cmd_verify(files, secret, format, &config, params),

        Commands::Identity { command } => cmd_identity(command, format, &config, params),
    }
}

fn engine(path: &Path, format: StorageFormat) -> ContainerEngine {
    ContainerEngine::new(open_support(path, format))
}

/// Verifies each file and keeps going; any failure makes the overall
/// exit status nonzero.
fn cmd_verify(
    files: Vec<PathBuf>,
    secret: SecretArgs,
    format: StorageFormat,
    config: &Config,
    params: KdfParams,
) -> anyhow::Result<()> {
    if files.is_empty() {
        bail!("no files given");
    }

    // Resolve the password once up front so a batch prompts only once.
    let password = if secret.ssh_key {
        None
    } else {
        Some(get_password(secret.master_password.clone())?)
    };

    let mut failures = 0usize;
    for file in &files {
        let engine = engine(file, format);
        let result: anyhow::Result<Vec<u8>> = if secret.ssh_key {
            resolve_identity(file, &secret, config).and_then(|credential| {
                IdentityRegistry::new(&engine)
                    .read(
                        &credential.auth_id,
                        &credential.private_key,
                        credential.passphrase.as_deref(),
                    )
                    .map_err(Into::into)
            })
        } else {
            engine
                .read(password.as_deref().unwrap_or_default(), &params)
                .map_err(Into::into)
        };

        match result {
            Ok(_) => println!("{}: OK", file.display()),
            Err(e) => {
                println!("{}: FAILED ({e:#})", file.display());
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} file(s) failed verification", files.len());
    }
    Ok(())
}

fn cmd_identity(
    command: IdentityCommands,
    format: StorageFormat,
    config: &Config,
    params: KdfParams,
) -> anyhow::Result<()> {
    match command {
        IdentityCommands::Add {
            file,
            public_key,
            auth_id,
            master_password,
        } => {
            let text = fs::read_to_string(&public_key)
                .with_context(|| format!("reading {}", public_key.display()))?;
            let password = get_password(master_password)?;
            let engine = engine(&file, format);
            let auth_id = IdentityRegistry::new(&engine).add_identity(
                &password,
                &text,
                auth_id.as_deref(),
                &params,
            )?;
            println!("identity {auth_id} added to {}", file.display());
            Ok(())
        }

        IdentityCommands::Rm { file, auth_id } => {
            let auth_id = auth_id
                .or_else(|| config.for_file(&file).auth_id)
                .context("no auth id given: pass -a or set auth_id in the config file")?;
            let engine = engine(&file, format);
            IdentityRegistry::new(&engine).remove_identity(&auth_id)?;
            println!("identity {auth_id} removed from {}", file.display());
            Ok(())
        }

        IdentityCommands::Ls { file } => {
            let engine = engine(&file, format);
            for (auth_id, public_key) in IdentityRegistry::new(&engine).list_identities()? {
                println!("{auth_id}\t{public_key}");
            }
            Ok(())
        }
    }
}

/// Builds the unlock capability for an edit session.
fn build_capability(
    file: &Path,
    format: StorageFormat,
    secret: &SecretArgs,
    config: &Config,
    params: KdfParams,
) -> anyhow::Result<Arc<dyn UnlockCapability>> {
    let engine = engine(file, format);
    if secret.ssh_key {
        let credential = resolve_identity(file, secret, config)?;
        Ok(Arc::new(IdentityUnlock::new(
            engine,
            credential.auth_id,
            credential.private_key,
            credential.passphrase,
        )))
    } else {
        let password = get_password(secret.master_password.clone())?;
        Ok(Arc::new(PasswordUnlock::new(engine, password, params)))
    }
}

/// Resolves the private key and auth id for a container, from flags
/// first and the per-file config second. Nothing here consults ambient
/// process state.
fn resolve_identity(
    file: &Path,
    secret: &SecretArgs,
    config: &Config,
) -> anyhow::Result<IdentityCredential> {
    let defaults = config.for_file(file);

    let key_file = secret
        .key_file
        .clone()
        .or(defaults.private_key)
        .context("no private key given: pass -y or set private_key in the config file")?;
    let private_key = fs::read_to_string(&key_file)
        .with_context(|| format!("reading private key {}", key_file.display()))?;

    let auth_id = secret
        .auth_id
        .clone()
        .or(defaults.auth_id)
        .context("no auth id given: pass -a or set auth_id in the config file")?;

    Ok(IdentityCredential {
        auth_id,
        private_key,
        passphrase: secret.key_passphrase.clone(),
    })
}

fn get_password(given: Option<String>) -> anyhow::Result<String> {
    match given {
        Some(password) => Ok(password),
        None => Ok(rpassword::prompt_password("Master password: ")?),
    }
}

/// Prompt twice when creating something new.
fn get_or_confirm_password(given: Option<String>) -> anyhow::Result<String> {
    match given {
        Some(password) => Ok(password),
        None => {
            let password = rpassword::prompt_password("Master password: ")?;
            let confirm = rpassword::prompt_password("Confirm password: ")?;
            if password != confirm {
                bail!("passwords do not match");
            }
            Ok(password)
        }
    }
}
