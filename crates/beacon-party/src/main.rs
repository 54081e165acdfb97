//! Beacon Party CLI
//!
//! Command-line interface for running beacon operations locally:
//! - Distributed Key Generation (DKG) for a validator set
//! - A full randomness round against stored key material
//! - Inspection of the stored group parameters

use anyhow::{bail, Context, Result};
use beacon_core::dkg::run_dkg;
use beacon_core::elgamal::{create_decryption_share, encrypt};
use beacon_core::group::encoding::point_to_hex;
use beacon_core::round::{verify_contributions, ShareCollector, Submission};
use beacon_core::{
    Curve, CurveId, DistKeyShare, DkgConfig, GroupPublic, NistP256, ParticipantIndex, Secp256k1,
    Suite,
};
use clap::{Parser, Subcommand};
use rand::rngs::OsRng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Beacon Party - threshold randomness beacon node
#[derive(Parser)]
#[command(name = "beacon-party")]
#[command(about = "Threshold ElGamal randomness beacon node")]
#[command(version)]
struct Cli {
    /// Data directory for key shares and group parameters
    #[arg(short, long, env = "BEACON_DATA_DIR", default_value = "./data")]
    dest: PathBuf,

    /// Curve backend (secp256k1 or p256)
    #[arg(short, long, env = "BEACON_CURVE", default_value = "secp256k1")]
    curve: CurveId,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run distributed key generation among local participants
    Keygen {
        /// Number of participants
        #[arg(short, long)]
        n: usize,

        /// Threshold (t-of-n)
        #[arg(short, long)]
        t: usize,
    },

    /// Run one randomness round with the stored key material
    Round {
        /// Number of contributions to encrypt (defaults to one per participant)
        #[arg(short, long)]
        contributors: Option<usize>,

        /// Participant indices publishing decryption shares (comma-separated)
        #[arg(short = 'p', long)]
        decryptors: String,
    },

    /// Show group info
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    std::fs::create_dir_all(&cli.dest)?;

    match cli.curve {
        CurveId::Secp256k1 => dispatch::<Secp256k1>(&cli),
        CurveId::P256 => dispatch::<NistP256>(&cli),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn dispatch<C: Curve>(cli: &Cli) -> Result<()> {
    match cli.command {
        Commands::Keygen { n, t } => run_keygen::<C>(cli, n, t),
        Commands::Round {
            contributors,
            ref decryptors,
        } => run_round::<C>(cli, contributors, decryptors),
        Commands::Info => show_info::<C>(cli),
    }
}

fn run_keygen<C: Curve>(cli: &Cli, n: usize, t: usize) -> Result<()> {
    let config = DkgConfig::new(n, t, cli.curve)?;
    let output = run_dkg::<C>(&config)?;

    for share in &output.shares {
        write_json(&key_share_path(cli, share.index()), share)?;
    }
    let group_path = group_path(cli);
    write_json(&group_path, &output.group)?;

    let public_key = point_to_hex(&output.public_key());
    info!(
        public_key = %public_key,
        qual = ?output.qual,
        path = ?cli.dest,
        "DKG completed, key shares saved"
    );

    println!("Public Key: {public_key}");
    println!("QUAL: {:?}", output.qual);

    Ok(())
}

fn run_round<C: Curve>(cli: &Cli, contributors: Option<usize>, decryptors_str: &str) -> Result<()> {
    let group = load_group::<C>(cli)?;
    let suite = Suite::<C>::new()?;
    let contributors = contributors.unwrap_or(group.n_parties);
    if contributors < group.threshold {
        bail!(
            "A round needs at least {} contributions, got {contributors}",
            group.threshold
        );
    }

    // Parse decryptors
    let decryptors: Vec<ParticipantIndex> = decryptors_str
        .split(',')
        .map(|s| s.trim().parse())
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Decryptors must be comma-separated participant indices")?;

    info!(
        contributors,
        decryptors = ?decryptors,
        threshold = group.threshold,
        "Starting round"
    );

    let mut submissions = Vec::with_capacity(contributors);
    for i in 0..contributors {
        let (contribution, _) = encrypt(&suite, &group.public_key, &mut OsRng)?;
        submissions.push(Submission {
            submitter: format!("contributor-{i}"),
            contribution,
        });
    }

    let round = verify_contributions(
        &suite,
        &point_to_hex(&group.public_key),
        &submissions,
        group.threshold,
    )?;
    for rejection in &round.rejections {
        warn!(submitter = %rejection.submitter, reason = %rejection.reason, "Contribution dropped");
    }

    let mut collector = ShareCollector::new(suite, group, round.ciphertext)?;
    for &index in &decryptors {
        let key_share: DistKeyShare<C> = read_json(&key_share_path(cli, index))?;
        let share = create_decryption_share(&suite, &round.ciphertext, &key_share, &mut OsRng)?;
        collector.add(&format!("participant-{index}"), &share)?;
    }

    let output = point_to_hex(&collector.finalize()?);
    info!(
        accepted = round.accepted.len(),
        shares = collector.len(),
        output = %output,
        "Round completed"
    );

    println!("Ciphertext A: {}", point_to_hex(&round.ciphertext.a));
    println!("Ciphertext B: {}", point_to_hex(&round.ciphertext.b));
    println!("Output: {output}");

    Ok(())
}

fn show_info<C: Curve>(cli: &Cli) -> Result<()> {
    let group = load_group::<C>(cli)?;

    println!("Group Info:");
    println!("  Curve: {}", group.curve);
    println!("  N Parties: {}", group.n_parties);
    println!("  Threshold: {}", group.threshold);
    println!("  Public Key: {}", point_to_hex(&group.public_key));
    for (i, key) in group.verification_keys.iter().enumerate() {
        println!("  Verification Key {i}: {}", point_to_hex(key));
    }

    Ok(())
}

fn load_group<C: Curve>(cli: &Cli) -> Result<GroupPublic<C>> {
    let group: GroupPublic<C> = read_json(&group_path(cli))?;
    if group.curve != C::ID {
        bail!(
            "Stored group uses {} but --curve selects {}",
            group.curve,
            C::ID
        );
    }
    Ok(group)
}

fn key_share_path(cli: &Cli, index: ParticipantIndex) -> PathBuf {
    cli.dest.join(format!("keyshare.{index}.json"))
}

fn group_path(cli: &Cli) -> PathBuf {
    cli.dest.join("group.json")
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(serde_json::from_str(&json)?)
}
