//! Lanscope Dump - Event Stream Pretty-Printer
//!
//! Reads the length-framed event stream produced by lanscope-snoop and
//! prints one human-readable block per event.

use anyhow::{Context, Result};
use chrono::DateTime;
use clap::Parser;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;

use lanscope_snoop::events::{self, Attachment, Event, EventBody};

/// Lanscope Event Stream Pretty-Printer
#[derive(Parser, Debug)]
#[command(name = "lanscope-dump")]
#[command(author = "SecuAAS")]
#[command(version)]
#[command(about = "Pretty-prints a lanscope event stream", long_about = None)]
struct Args {
    /// Event stream file (defaults to stdin)
    file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut reader: Box<dyn Read> = match &args.file {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("unable to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let mut count = 0u64;
    while let Some(event) = events::read_event(&mut reader)? {
        if count > 0 {
            println!();
        }
        print_event(&event);
        count += 1;
    }

    Ok(())
}

fn attachment(attached_to: &Attachment) -> String {
    match attached_to {
        Attachment::Interface(id) => format!("interface {}", id),
        Attachment::Cloud(id) => format!("cloud {}", id),
    }
}

fn print_event(event: &Event) {
    match &event.body {
        EventBody::Network(network) => {
            println!("Network");
            println!("    id:         {}", network.id);
            println!("    fini:       {}", network.fini);
        }
        EventBody::Interface(interface) => {
            println!("Interface");
            println!("    id:         {}", interface.id);
            println!("    fini:       {}", interface.fini);
            println!("    address:    {}", interface.address);
            println!("    network_id: {}", interface.network_id);
            if !interface.maker.is_empty() {
                println!("    maker:      {}", interface.maker);
            }
        }
        EventBody::IpAddress(ip) => {
            println!("IPAddress");
            println!("    id:         {}", ip.id);
            println!("    fini:       {}", ip.fini);
            println!("    address:    {}", ip.address);
            if !ip.ns_name.is_empty() {
                println!("    ns_name:    {}", ip.ns_name);
            }
            println!("    attached:   {}", attachment(&ip.attached_to));
            if let Some(asn) = ip.asn {
                match &ip.as_name {
                    Some(name) => println!("    asn:        {} ({})", asn, name),
                    None => println!("    asn:        {}", asn),
                }
            }
        }
        EventBody::Cloud(cloud) => {
            println!("Cloud");
            println!("    id:         {}", cloud.id);
            println!("    fini:       {}", cloud.fini);
            println!("    descr:      {}", cloud.description);
            println!("    attached:   {}", attachment(&cloud.attached_to));
        }
        EventBody::Traffic(traffic) => {
            println!("Traffic");
            print_counts("interfaces", &traffic.interface_packet_counts);
            print_counts("clouds", &traffic.cloud_packet_counts);
            print_counts("addresses", &traffic.ipaddress_packet_counts);
        }
    }

    let seconds = event.timestamp / 1_000_000_000;
    let nanos = (event.timestamp % 1_000_000_000) as u32;
    let when = DateTime::from_timestamp(seconds, nanos)
        .map(|t| t.format("%F %T%.3f").to_string())
        .unwrap_or_else(|| event.timestamp.to_string());
    println!("    timestamp:  {}", when);
    println!("    packet:     {}", event.packet);
}

fn print_counts(label: &str, counts: &std::collections::BTreeMap<i64, i64>) {
    if counts.is_empty() {
        return;
    }
    let rendered: Vec<String> = counts
        .iter()
        .map(|(id, count)| format!("{}={}", id, count))
        .collect();
    println!("    {:<11} {}", format!("{}:", label), rendered.join(" "));
}
