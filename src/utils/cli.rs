// Copyright 2021 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
//! Command Line Interface configuration
use std::path::PathBuf;
use structopt::StructOpt;

/// Lists the certificates held on PKCS #11 tokens and signs data with the private key sitting
/// next to one of them.
///
/// Certificates are named by identifiers of the form `PKCS:<SHA-1 thumbprint>=<library path>`,
/// as printed by the `list` command.
///
/// Logging and the user PIN come from the configuration file.
#[derive(StructOpt, Debug)]
pub struct Opts {
    /// Sets the configuration file path
    #[structopt(short, long, default_value = "config.toml")]
    pub config: String,

    /// Command to run
    #[structopt(subcommand)]
    pub command: Command,
}

/// Commands of the tool
#[derive(StructOpt, Debug)]
pub enum Command {
    /// List the public certificates found on every token of a PKCS #11 library
    List {
        /// Path of the PKCS #11 library
        #[structopt(short, long)]
        module: String,
    },

    /// Show the certificate an identifier names
    Show {
        /// Certificate identifier
        #[structopt(short, long)]
        certificate: String,
    },

    /// Sign data with the private key of a certificate
    Sign {
        /// Certificate identifier
        #[structopt(short, long)]
        certificate: String,

        /// Hash algorithm applied to the data before signing
        #[structopt(long, default_value = "sha256")]
        hash: String,

        /// File holding the data to sign, standard input if absent
        #[structopt(short, long, parse(from_os_str))]
        input: Option<PathBuf>,

        /// File receiving the raw signature, hex on standard output if absent
        #[structopt(short, long, parse(from_os_str))]
        output: Option<PathBuf>,
    },
}
