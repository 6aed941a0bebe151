//! sharecrypt: ShareCrypt command-line interface
//!
//! Commands:
//!   config show                      - display current configuration
//!   master-key generate|derive|fingerprint
//!   seal <input>                     - encrypt a file, store its wrapped key
//!   open <ciphertext> --record <r>   - decrypt a sealed file
//!   wrap <file_key> / unwrap <wrapped>
//!   rotate --new-key-env VAR         - re-wrap every stored key under a new master key

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Args, Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};

use sharecrypt_core::config::ShareCryptConfig;
use sharecrypt_core::{FileRecord, ShareCryptError};
use sharecrypt_crypto::{
    derive_master_key, generate_salt, Algorithm, FileCipher, KeyEnvelope, MasterKey, WrappedKey,
    SALT_SIZE,
};
use sharecrypt_vault::master::kdf_params;
use sharecrypt_vault::{
    load_envelope, load_master_key, open_download, rotate_all, seal_upload, FileUpload,
    WrappedKeyStore,
};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "sharecrypt",
    version,
    about = "ShareCrypt file encryption client",
    long_about = "sharecrypt: seal and open files with per-file keys wrapped under a master key"
)]
struct Cli {
    /// Path to sharecrypt.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "SHARECRYPT_CONFIG",
        default_value = "/etc/sharecrypt/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SHARECRYPT_LOG", default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Master key management
    #[command(name = "master-key")]
    MasterKey {
        #[command(subcommand)]
        action: MasterKeyAction,
    },

    /// Encrypt a file under a fresh key and store the wrapped key
    ///
    /// Writes the ciphertext to --out and the file record to <out>.record.json.
    Seal(SealArgs),

    /// Decrypt a sealed file using its record and the stored wrapped key
    Open(OpenArgs),

    /// Wrap a base64 file key under the master key
    Wrap { file_key: String },

    /// Unwrap a wrapped key back to the base64 file key
    Unwrap { wrapped: String },

    /// Re-wrap every stored key under a new master key
    Rotate {
        /// Env var holding the new base64 master key
        #[arg(long)]
        new_key_env: String,
    },
}

#[derive(Args, Debug)]
struct SealArgs {
    /// Plaintext file
    input: PathBuf,
    /// Ciphertext destination (default: <input>.enc)
    #[arg(long, short = 'o')]
    out: Option<PathBuf>,
    /// Key store id (default: the input file name; must not already have a key)
    #[arg(long)]
    file_id: Option<String>,
    /// Content type (default: guessed from the extension)
    #[arg(long)]
    mime: Option<String>,
    /// aes-256-gcm or chacha20-poly1305 (default: cipher.algorithm from config)
    #[arg(long)]
    algorithm: Option<String>,
}

#[derive(Args, Debug)]
struct OpenArgs {
    /// Ciphertext file
    ciphertext: PathBuf,
    /// Record written by `seal`
    #[arg(long, short = 'r')]
    record: PathBuf,
    /// Plaintext destination (default: ciphertext path without .enc)
    #[arg(long, short = 'o')]
    out: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Subcommand, Debug)]
enum MasterKeyAction {
    /// Generate a random master key
    Generate,
    /// Derive a master key from a passphrase (Argon2id)
    Derive {
        /// Base64 salt from a previous derive (default: new random salt)
        #[arg(long)]
        salt: Option<String>,
    },
    /// Print the fingerprint of the configured master key
    Fingerprint,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);
    let config = load_config(&cli.config).await?;

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Show => cmd_config_show(&config, &cli.config),
        },
        Commands::MasterKey { action } => match action {
            MasterKeyAction::Generate => cmd_master_generate(),
            MasterKeyAction::Derive { salt } => cmd_master_derive(&config, salt.as_deref()),
            MasterKeyAction::Fingerprint => cmd_master_fingerprint(&config),
        },
        Commands::Seal(args) => cmd_seal(&config, args).await,
        Commands::Open(args) => cmd_open(&config, args).await,
        Commands::Wrap { file_key } => cmd_wrap(&config, &file_key),
        Commands::Unwrap { wrapped } => cmd_unwrap(&config, &wrapped),
        Commands::Rotate { new_key_env } => cmd_rotate(&config, &new_key_env).await,
    }
}

async fn load_config(path: &Path) -> Result<ShareCryptConfig> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(ShareCryptConfig::default())
    }
}

fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn envelope(config: &ShareCryptConfig) -> Result<KeyEnvelope> {
    load_envelope(&config.envelope).context("loading master key")
}

fn key_store(config: &ShareCryptConfig) -> Result<WrappedKeyStore> {
    WrappedKeyStore::from_config(&config.keystore).context("opening key store")
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn cmd_config_show(config: &ShareCryptConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!(
            "# Configuration: defaults (no file at {})",
            config_path.display()
        );
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

fn cmd_master_generate() -> Result<()> {
    let key = MasterKey::generate().context("generating master key")?;
    eprintln!("fingerprint: {}", key.fingerprint());
    println!("{}", key.to_base64().expose_secret());
    Ok(())
}

fn cmd_master_derive(config: &ShareCryptConfig, salt: Option<&str>) -> Result<()> {
    let salt = match salt {
        Some(encoded) => decode_salt(encoded)?,
        None => generate_salt().context("generating salt")?,
    };

    let passphrase = SecretString::from(
        rpassword::prompt_password("Passphrase: ").context("reading passphrase")?,
    );
    let confirm = SecretString::from(
        rpassword::prompt_password("Confirm passphrase: ").context("reading passphrase")?,
    );
    if passphrase.expose_secret() != confirm.expose_secret() {
        anyhow::bail!("passphrases do not match");
    }
    if passphrase.expose_secret().is_empty() {
        anyhow::bail!("passphrase must not be empty");
    }

    let key = derive_master_key(&passphrase, &salt, &kdf_params(&config.envelope))
        .context("deriving master key")?;

    eprintln!("salt:        {}", STANDARD.encode(salt));
    eprintln!("fingerprint: {}", key.fingerprint());
    println!("{}", key.to_base64().expose_secret());
    Ok(())
}

fn decode_salt(encoded: &str) -> Result<[u8; SALT_SIZE]> {
    let raw = STANDARD
        .decode(encoded.trim())
        .context("salt is not valid base64")?;
    raw.as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("salt must be {SALT_SIZE} bytes, got {}", raw.len()))
}

fn cmd_master_fingerprint(config: &ShareCryptConfig) -> Result<()> {
    let key = load_master_key(&config.envelope).context("loading master key")?;
    println!("{}", key.fingerprint());
    Ok(())
}

async fn cmd_seal(config: &ShareCryptConfig, args: SealArgs) -> Result<()> {
    let input = args.input.as_path();
    let algorithm: Algorithm = args
        .algorithm
        .as_deref()
        .unwrap_or(config.cipher.algorithm.as_str())
        .parse()
        .context("choosing cipher algorithm")?;

    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;

    let file_id = match args.file_id {
        Some(id) => id,
        None => default_file_id(input)?,
    };
    let mime = args.mime.unwrap_or_else(|| guess_mime(input));
    let out = args.out.unwrap_or_else(|| append_extension(input, "enc"));
    let storage_path = out.display().to_string();

    let envelope = envelope(config)?;
    let store = key_store(config)?;

    let sealed = seal_upload(
        &FileCipher::new(algorithm),
        &envelope,
        &store,
        FileUpload {
            file_id: &file_id,
            storage_path: &storage_path,
            mime_type: &mime,
            bytes: &bytes,
        },
    )
    .await;
    let sealed = match sealed {
        Ok(sealed) => sealed,
        Err(ShareCryptError::FileIdExists(id)) => {
            anyhow::bail!("file id {id} exists; pass --file-id")
        }
        Err(e) => return Err(e).with_context(|| format!("sealing {}", input.display())),
    };

    tokio::fs::write(&out, &sealed.ciphertext)
        .await
        .with_context(|| format!("writing {}", out.display()))?;

    let record_path = append_extension(&out, "record.json");
    let record_json =
        serde_json::to_string_pretty(&sealed.record).context("serializing file record")?;
    tokio::fs::write(&record_path, record_json)
        .await
        .with_context(|| format!("writing {}", record_path.display()))?;

    println!("Sealed:");
    println!("  file id:    {file_id}");
    println!("  algorithm:  {algorithm}");
    println!("  mime:       {mime}");
    println!("  size:       {} bytes", sealed.record.size);
    println!("  ciphertext: {}", out.display());
    println!("  record:     {}", record_path.display());
    Ok(())
}

async fn cmd_open(config: &ShareCryptConfig, args: OpenArgs) -> Result<()> {
    let record_path = args.record.as_path();
    let ciphertext_path = args.ciphertext.as_path();

    let record_json = tokio::fs::read_to_string(record_path)
        .await
        .with_context(|| format!("reading {}", record_path.display()))?;
    let record: FileRecord = serde_json::from_str(&record_json)
        .with_context(|| format!("parsing record {}", record_path.display()))?;

    let ciphertext = tokio::fs::read(ciphertext_path)
        .await
        .with_context(|| format!("reading {}", ciphertext_path.display()))?;

    let envelope = envelope(config)?;
    let store = key_store(config)?;

    let decrypted = open_download(&envelope, &store, &record, &ciphertext)
        .await
        .with_context(|| format!("opening {}", ciphertext_path.display()))?;

    let out = args
        .out
        .unwrap_or_else(|| default_open_path(ciphertext_path));
    tokio::fs::write(&out, &decrypted.bytes)
        .await
        .with_context(|| format!("writing {}", out.display()))?;

    println!("Opened:");
    println!("  file id:  {}", record.file_id);
    println!("  mime:     {}", decrypted.mime_type);
    println!("  size:     {} bytes", decrypted.bytes.len());
    println!("  output:   {}", out.display());
    Ok(())
}

fn cmd_wrap(config: &ShareCryptConfig, file_key: &str) -> Result<()> {
    let wrapped = envelope(config)?
        .wrap(file_key)
        .context("wrapping file key")?;
    println!("{wrapped}");
    Ok(())
}

fn cmd_unwrap(config: &ShareCryptConfig, wrapped: &str) -> Result<()> {
    let file_key = envelope(config)?
        .unwrap(&WrappedKey::new(wrapped))
        .context("unwrapping file key")?;
    println!("{}", file_key.expose_secret());
    Ok(())
}

async fn cmd_rotate(config: &ShareCryptConfig, new_key_env: &str) -> Result<()> {
    let from = envelope(config)?;
    let new_key = std::env::var(new_key_env).with_context(|| format!("{new_key_env} is not set"))?;
    let new_master = MasterKey::from_base64(&SecretString::from(new_key))
        .context("loading new master key")?;
    let to = KeyEnvelope::new(new_master);

    if from.fingerprint() == to.fingerprint() {
        anyhow::bail!("new master key is the same as the current one");
    }

    let store = key_store(config)?;
    let report = rotate_all(&from, &to, &store)
        .await
        .context("rotating keys")?;

    println!("Rotation {} → {}:", from.fingerprint(), to.fingerprint());
    println!("  rotated:         {}", report.rotated);
    println!("  already current: {}", report.already_current);
    println!("  failed:          {}", report.failed.len());
    for (file_id, error) in &report.failed {
        println!("    {file_id}: {error}");
    }

    if !report.failed.is_empty() {
        anyhow::bail!("{} keys could not be rotated", report.failed.len());
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// File name with characters outside `[A-Za-z0-9._-]` replaced by `_`.
fn default_file_id(input: &Path) -> Result<String> {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("no file name in {}; pass --file-id", input.display()))?;

    let id: String = name.chars().map(file_id_char).collect();
    Ok(id)
}

fn file_id_char(c: char) -> char {
    if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
        c
    } else {
        '_'
    }
}

fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(mime_guess::mime::APPLICATION_OCTET_STREAM.as_ref())
        .to_string()
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

fn default_open_path(ciphertext: &Path) -> PathBuf {
    match ciphertext.extension() {
        Some(ext) if ext == "enc" => ciphertext.with_extension(""),
        _ => append_extension(ciphertext, "dec"),
    }
}
