//! Command-line interface for building and verifying Wallet pass bundles.
//!
//! `passkit build` renders a descriptor template, collects assets, signs the
//! manifest, and packages the bundle. `passkit verify` checks an existing
//! bundle and reports every defect it finds.

use clap::{Parser, Subcommand};
use passkit::template::{self, PassConfig};
use passkit::{PassBuilder, PassVerifier, SigningIdentity, Verdict, VerificationReport};
use secrecy::SecretString;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "passkit")]
#[command(about = "Build and verify signed Wallet pass bundles")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and sign a pass bundle
    Build {
        /// Pass descriptor template (JSON)
        #[arg(long)]
        template: PathBuf,

        /// Directory of assets to include (images, localizations)
        #[arg(long)]
        assets: Option<PathBuf>,

        /// Signer certificate file (PEM format)
        #[arg(short = 'c', long)]
        cert: Option<PathBuf>,

        /// Private key file (PEM format)
        #[arg(short = 'k', long)]
        key: Option<PathBuf>,

        /// PKCS#12 signing identity (.p12)
        #[arg(short = 'p', long)]
        p12: Option<PathBuf>,

        /// Intermediate (WWDR) certificate file (PEM format)
        #[arg(short = 'i', long)]
        intermediate: PathBuf,

        /// Output bundle path
        #[arg(short, long)]
        output: PathBuf,

        /// Team identifier substituted into the template
        #[arg(long)]
        team_id: Option<String>,

        /// Pass type identifier substituted into the template
        #[arg(long)]
        pass_type_id: Option<String>,

        /// Organization name substituted into the template
        #[arg(long)]
        organization: Option<String>,

        /// Password for the private key or PKCS#12 file
        #[arg(long)]
        password: Option<String>,

        /// ZIP compression level (0-9)
        #[arg(short = 'z', long, default_value = "9")]
        zip_level: u32,
    },

    /// Verify a pass bundle
    Verify {
        /// Bundle file to verify
        bundle: PathBuf,

        /// Trust anchor certificate for signature checking (PEM format)
        #[arg(long)]
        ca: Option<PathBuf>,

        /// Print the verification report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    match cli.command {
        Commands::Build {
            template,
            assets,
            cert,
            key,
            p12,
            intermediate,
            output,
            team_id,
            pass_type_id,
            organization,
            password,
            zip_level,
        } => {
            let password = password.map(SecretString::new);
            let identity = load_identity(
                cert.as_deref(),
                key.as_deref(),
                p12.as_deref(),
                &intermediate,
                password.as_ref(),
            )?;

            if let Some(ref team) = identity.team_id {
                info!("Signing as team {}", team);
            }

            let descriptor = load_descriptor(&template, team_id, pass_type_id, organization)?;

            let mut builder = PassBuilder::new()
                .descriptor(descriptor)
                .compression_level(zip_level);
            if let Some(assets) = assets {
                builder = builder.asset_dir(assets);
            }

            builder.build(&identity, &output)?;
            println!("Built: {}", output.display());
        }

        Commands::Verify { bundle, ca, json } => {
            let mut verifier = PassVerifier::new();
            if let Some(ca) = ca {
                verifier = verifier.trust_anchor_file(&ca)?;
            } else {
                warn!("No --ca given; the signature will not be checked");
            }

            let report = verifier.verify(&bundle)?;

            if json {
                print_json_report(&report)?;
            } else {
                print_report(&report);
            }

            if report.verdict() == Verdict::Invalid {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Load the signing identity from either a PEM pair or a PKCS#12 file.
fn load_identity(
    cert: Option<&std::path::Path>,
    key: Option<&std::path::Path>,
    p12: Option<&std::path::Path>,
    intermediate: &std::path::Path,
    password: Option<&SecretString>,
) -> Result<SigningIdentity, Box<dyn std::error::Error>> {
    if let Some(p12_path) = p12 {
        let identity = SigningIdentity::from_p12_files(p12_path, intermediate, password)?;
        return Ok(identity);
    }

    if let (Some(cert_path), Some(key_path)) = (cert, key) {
        let identity =
            SigningIdentity::from_pem_files(cert_path, key_path, intermediate, password)?;
        return Ok(identity);
    }

    Err("Must provide either --p12 or both --cert and --key".into())
}

/// Read the descriptor template, rendering it when issuer flags are given.
fn load_descriptor(
    template_path: &std::path::Path,
    team_id: Option<String>,
    pass_type_id: Option<String>,
    organization: Option<String>,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let template_bytes = std::fs::read(template_path)?;

    if team_id.is_none() && pass_type_id.is_none() && organization.is_none() {
        return Ok(template_bytes);
    }

    let (Some(team_id), Some(pass_type_id), Some(organization)) =
        (team_id, pass_type_id, organization)
    else {
        return Err("--team-id, --pass-type-id, and --organization must be given together".into());
    };

    let config = PassConfig::new(team_id, pass_type_id, organization);
    let descriptor = template::render(&template_bytes, &config)?;
    info!("Rendered descriptor template {}", template_path.display());
    Ok(descriptor)
}

fn print_report(report: &VerificationReport) {
    if let Some(descriptor) = report.descriptor() {
        println!("Pass details:");
        let fields = [
            ("Organization", "organizationName"),
            ("Description", "description"),
            ("Serial number", "serialNumber"),
            ("Team identifier", "teamIdentifier"),
            ("Pass type identifier", "passTypeIdentifier"),
        ];
        for (label, field) in fields {
            if let Some(value) = descriptor.get(field).and_then(|v| v.as_str()) {
                println!("  {}: {}", label, value);
                if let Some(token) = template::find_placeholder(value) {
                    warn!("Descriptor still contains the {} placeholder", token);
                }
            }
        }
        println!();
    }

    match report.verdict() {
        Verdict::Valid => println!("Bundle is valid"),
        Verdict::SignatureSkipped => {
            println!("Bundle is consistent, but the signature was not checked");
        }
        Verdict::Invalid => {
            println!("Bundle verification failed:");
            for finding in report.findings() {
                println!("  - {}", finding);
            }
        }
    }
}

fn print_json_report(report: &VerificationReport) -> Result<(), serde_json::Error> {
    let value = serde_json::json!({
        "verdict": report.verdict(),
        "signature": report.signature_status(),
        "findings": report.findings(),
        "descriptor": report.descriptor(),
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
