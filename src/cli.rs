use clap::{Parser, Subcommand};

/// Campus Lost & Found — moderated listing service
#[derive(Parser)]
#[command(name = "lostfound", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (defaults to LOSTFOUND_PORT or 8080)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Inspect and moderate items
    Item {
        #[command(subcommand)]
        command: ItemCommands,
    },

    /// Manage the administrator role
    Role {
        #[command(subcommand)]
        command: RoleCommands,
    },

    /// Issue session tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
pub enum ItemCommands {
    /// List items, optionally by status
    List {
        /// pending, approved or rejected
        #[arg(short, long)]
        status: Option<String>,
    },
    /// Approve an item so it shows in the public listing
    Approve {
        item_id: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Reject an item
    Reject {
        item_id: String,
        #[arg(long)]
        note: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum RoleCommands {
    /// Grant the admin role to a user
    Grant { user_id: String },
    /// Revoke the admin role from a user
    Revoke { user_id: String },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Mint a session token for a user
    Issue {
        user_id: String,
        #[arg(long)]
        ttl_hours: Option<i64>,
    },
}
