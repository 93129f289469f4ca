use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "notary-cli")]
#[command(about = "CLI client for a notary ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a transaction to the pending pool
    Submit {
        /// Unique transaction id
        #[arg(long)]
        id: String,
        /// Opaque payload, e.g. a document anchor
        #[arg(long)]
        data: String,
        /// Signer public key, hex
        #[arg(long)]
        public_key: Option<String>,
        /// Signature over the payload, hex
        #[arg(long)]
        signature: Option<String>,
    },
    /// Create the genesis block
    Genesis,
    /// Mine the next block out of the pending pool
    Mine,
    /// Print the full chain
    Chain,
    /// Print the chain head
    Head,
    /// Print the pending pool
    Pool,
    /// Print every packaged transaction in chain order
    Packed,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Tx {
    id: String,
    data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    public_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node;
    let client = reqwest::Client::new();

    let res = match cli.cmd {
        Command::Submit { id, data, public_key, signature } => {
            let tx = Tx { id, data, public_key, signature };
            client.post(format!("{node}/tx")).json(&tx).send().await?
        }
        Command::Genesis => client.post(format!("{node}/genesis")).send().await?,
        Command::Mine => client.post(format!("{node}/mine")).send().await?,
        Command::Chain => client.get(format!("{node}/chain")).send().await?,
        Command::Head => client.get(format!("{node}/chain/head")).send().await?,
        Command::Pool => client.get(format!("{node}/pool")).send().await?,
        Command::Packed => client.get(format!("{node}/transactions/packed")).send().await?,
    };

    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    println!("{body}");
    Ok(())
}
