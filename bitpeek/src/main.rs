use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Error};
use bitpeek_bencode::{Decoder, DEFAULT_MAX_DEPTH};
use bitpeek_metainfo::{project, Torrent};
use clap::Parser;
use log::{info, warn};
use tokio::io::AsyncReadExt;

/// Print the tracker, name, sizes and piece hashes of a .torrent file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the torrent file, or `-` for stdin
    torrent: PathBuf,

    /// Print the parsed torrent as JSON
    #[arg(long)]
    json: bool,

    /// Deepest container nesting accepted in the input
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(e) = run(Args::parse()).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Error> {
    let buf = read_input(&args.torrent).await?;
    info!("read {} bytes from {}", buf.len(), args.torrent.display());

    let root = Decoder::with_max_depth(&buf[..], args.max_depth)
        .decode_next()
        .context("decoding bencode")?;
    let torrent = project(&root).context("reading torrent metainfo")?;

    let info = torrent.info();
    if !info.has_consistent_piece_count() {
        warn!(
            "{} piece hashes for {} pieces",
            info.pieces().len(),
            info.expected_piece_count()
        );
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&torrent)?);
    } else {
        write_torrent(&mut io::stdout().lock(), &torrent)?;
    }
    Ok(())
}

async fn read_input(path: &Path) -> Result<Vec<u8>, Error> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut buf)
            .await
            .context("reading stdin")?;
        return Ok(buf);
    }
    tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

/// Writes length, piece length, piece count, one hex hash per line, name and
/// announce URL, in that order.
fn write_torrent<W: Write>(out: &mut W, torrent: &Torrent) -> io::Result<()> {
    let info = torrent.info();
    writeln!(out, "{}", info.length())?;
    writeln!(out, "{}", info.piece_length())?;
    writeln!(out, "{}", info.length() / info.piece_length())?;
    for piece in info.pieces() {
        writeln!(out, "{}", hex::encode(piece))?;
    }
    writeln!(out, "{}", info.name())?;
    writeln!(out, "{}", torrent.announce())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_args() {
        let args = Args::try_parse_from(["bitpeek", "ubuntu.torrent"]).unwrap();
        assert_eq!(args.torrent, PathBuf::from("ubuntu.torrent"));
        assert!(!args.json);
        assert_eq!(args.max_depth, DEFAULT_MAX_DEPTH);

        let args = Args::try_parse_from(["bitpeek", "--json", "--max-depth", "8", "-"]).unwrap();
        assert!(args.json);
        assert_eq!(args.max_depth, 8);
        assert_eq!(args.torrent, PathBuf::from("-"));
    }

    #[test]
    fn prints_fields_in_order() {
        let mut input = b"d8:announce31:http://tracker.example/announce4:infod6:lengthi32768e4:name8:file.iso12:piece lengthi16384e6:pieces40:".to_vec();
        input.extend_from_slice(&[0x01; 20]);
        input.extend_from_slice(&[0xab; 20]);
        input.extend_from_slice(b"ee");
        let torrent = bitpeek_metainfo::parse_torrent(&mut &input[..]).unwrap();

        let mut out = Vec::new();
        write_torrent(&mut out, &torrent).unwrap();
        let expected = format!(
            "32768\n16384\n2\n{}\n{}\nfile.iso\nhttp://tracker.example/announce\n",
            "01".repeat(20),
            "ab".repeat(20)
        );
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn torrent_path_is_required() {
        assert!(Args::try_parse_from(["bitpeek"]).is_err());
    }
}
