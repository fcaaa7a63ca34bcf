use std::net::Ipv4Addr;
use std::path::PathBuf;

use answerfile::{
    pages_base_url, render_boot_menu, render_chain_script, render_dnsmasq, DnsmasqOptions,
};
use anyhow::{bail, Result};
use clap::{Args, Subcommand};

use super::{write_output, App};

#[derive(Debug, Subcommand)]
pub enum NetbootCommand {
    /// iPXE menu with one entry per stored profile
    Menu {
        #[command(flatten)]
        target: Target,
    },

    /// iPXE script that chainloads the published menu
    Chain {
        #[command(flatten)]
        target: Target,
    },

    /// dnsmasq snippet that points PXE clients at the menu
    Dnsmasq {
        #[command(flatten)]
        target: Target,

        #[arg(long, default_value = "/var/lib/tftpboot")]
        tftp_root: String,

        #[arg(long, default_value = "172.20.0.100")]
        range_start: Ipv4Addr,

        #[arg(long, default_value = "172.20.0.199")]
        range_end: Ipv4Addr,

        #[arg(long, default_value = "255.255.255.0")]
        netmask: Ipv4Addr,

        #[arg(long, default_value = "12h")]
        lease_time: String,

        #[arg(long, default_value = "172.20.0.1")]
        router: Ipv4Addr,

        #[arg(long, default_value = "172.20.0.1")]
        dns_server: Ipv4Addr,
    },
}

#[derive(Debug, Args)]
pub struct Target {
    /// Where the netboot tree is served, defaults to the build repository's
    /// GitHub Pages site
    #[arg(long)]
    base_url: Option<String>,

    /// Output file, stdout if omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Target {
    fn base_url(&self, app: &App) -> String {
        self.base_url.clone().unwrap_or_else(|| {
            pages_base_url(&app.settings.github_owner, &app.settings.github_repo)
        })
    }
}

pub fn run(app: &App, command: NetbootCommand) -> Result<()> {
    match command {
        NetbootCommand::Menu { target } => {
            let store = app.open_store()?;
            if store.is_empty() {
                bail!("there are no stored profiles to put in the menu");
            }
            let menu = render_boot_menu(store.profiles(), &target.base_url(app))?;
            write_output(target.output.as_deref(), &menu)
        }
        NetbootCommand::Chain { target } => {
            write_output(target.output.as_deref(), &render_chain_script(&target.base_url(app)))
        }
        NetbootCommand::Dnsmasq {
            target,
            tftp_root,
            range_start,
            range_end,
            netmask,
            lease_time,
            router,
            dns_server,
        } => {
            let options = DnsmasqOptions {
                tftp_root,
                range_start,
                range_end,
                netmask,
                lease_time,
                router,
                dns_server,
            };
            let text = render_dnsmasq(&target.base_url(app), &options);
            write_output(target.output.as_deref(), &text)
        }
    }
}
