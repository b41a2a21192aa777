// Copyright 2019 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
//! Command line front end of the token certificate provider
#![deny(
    nonstandard_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    unused_allocation,
    unused_comparisons,
    unused_parens,
    while_true,
    missing_debug_implementations,
    missing_docs,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]

use anyhow::{Context, Result};
use log::info;
use pkcs11_certsign::identifier::ModuleId;
use pkcs11_certsign::key::TokenKey;
use pkcs11_certsign::pin::{CachedPins, ConfiguredPin};
use pkcs11_certsign::provider::{Provider, ProviderBuilder};
use pkcs11_certsign::utils::cli::{Command, Opts};
use pkcs11_certsign::utils::config::Config;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use structopt::StructOpt;

fn main() -> Result<()> {
    let opts: Opts = Opts::from_args();
    let mut config = Config::load(Path::new(&opts.config))?;

    let mut env_log_builder = env_logger::Builder::new();
    if let Some(level) = config.core_settings.log_level {
        let _ = env_log_builder.filter_level(level);
    }
    if let Some(true) = config.core_settings.log_timestamp {
        let _ = env_log_builder.format_timestamp_millis();
    } else {
        let _ = env_log_builder.format_timestamp(None);
    }
    env_log_builder.init();

    config.apply_global_settings();

    let pins = CachedPins::new(ConfiguredPin::new(config.pin.user_pin.take()));
    let provider = ProviderBuilder::new()
        .with_pin_provider(Arc::new(pins))
        .with_search_limits(config.search_limits())
        .build();

    match opts.command {
        Command::List { module } => list(&provider, &module),
        Command::Show { certificate } => show(&provider, &certificate),
        Command::Sign {
            certificate,
            hash,
            input,
            output,
        } => sign(&provider, &certificate, &hash, input, output),
    }
}

fn list(provider: &Provider, module: &str) -> Result<()> {
    let store = provider.build_store(&ModuleId::new(module))?;
    for certificate in &store {
        println!("{}\t{}", certificate.identifier(), certificate.subject());
    }
    info!("{} certificate(s) listed", store.len());

    Ok(())
}

fn show(provider: &Provider, identifier: &str) -> Result<()> {
    let certificate = provider.load_certificate(identifier)?;
    println!("Identifier: {}", certificate.identifier());
    println!("Subject:    {}", certificate.subject());
    println!("Module:     {}", certificate.module());
    println!("SHA-1:      {}", hex::encode_upper(certificate.thumbprint()));

    Ok(())
}

fn sign(
    provider: &Provider,
    identifier: &str,
    hash: &str,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let certificate = provider.load_certificate(identifier)?;
    let key = TokenKey::from_certificate(&certificate)?;

    let data = match input {
        Some(path) => std::fs::read(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut data = Vec::new();
            let _ = std::io::stdin()
                .read_to_end(&mut data)
                .context("Failed to read standard input")?;
            data
        }
    };

    let signature = provider.sign(&key, &data, hash)?;
    match output {
        Some(path) => std::fs::write(&path, signature.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout();
            writeln!(stdout, "{}", hex::encode(signature.as_bytes()))?;
        }
    }

    Ok(())
}
