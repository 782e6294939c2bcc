use std::io::{self, BufRead, Write};
use std::process;

use anyhow::{Context, Result};
use log::debug;
use rexec::{CompileFlags, InfoField, Regex, RegexBuilder, StudyFlags};

const USAGE: &str = "\
Usage: rexec -E PATTERN [-i] [-m] [-s] [-x] [-U] [-o] [-c]
             [--match-limit N] [--recursion-limit N] [--study] [--info]";

#[derive(Debug, Default)]
struct Args {
    pattern: Option<String>,
    flags: CompileFlags,
    only_matching: bool,
    count: bool,
    match_limit: Option<u64>,
    recursion_limit: Option<u64>,
    study: bool,
    info: bool,
}

fn parse_args() -> Result<Args, lexopt::Error> {
    use lexopt::prelude::*;

    let mut args = Args::default();
    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Short('E') | Long("regexp") => args.pattern = Some(parser.value()?.string()?),
            Short('i') => args.flags |= CompileFlags::CASELESS,
            Short('m') => args.flags |= CompileFlags::MULTILINE,
            Short('s') => args.flags |= CompileFlags::DOTALL,
            Short('x') => args.flags |= CompileFlags::EXTENDED,
            Short('U') => args.flags |= CompileFlags::UNGREEDY,
            Short('o') => args.only_matching = true,
            Short('c') => args.count = true,
            Long("match-limit") => args.match_limit = Some(parser.value()?.parse()?),
            Long("recursion-limit") => args.recursion_limit = Some(parser.value()?.parse()?),
            Long("study") => args.study = true,
            Long("info") => args.info = true,
            Short('h') | Long("help") => {
                println!("{USAGE}");
                process::exit(0);
            }
            Value(val) if args.pattern.is_none() => args.pattern = Some(val.string()?),
            _ => return Err(arg.unexpected()),
        }
    }
    Ok(args)
}

fn build(args: &Args, pattern: &str) -> Result<Regex> {
    let mut builder = RegexBuilder::new();
    builder.options(args.flags | CompileFlags::UTF8);
    if let Some(limit) = args.match_limit {
        builder.match_limit(limit);
    }
    if let Some(limit) = args.recursion_limit {
        builder.recursion_limit(limit);
    }
    if args.study {
        builder.study(StudyFlags::empty());
    }
    builder
        .build(pattern)
        .with_context(|| format!("invalid pattern {pattern:?}"))
}

/// Returns whether any line matched.
fn run() -> Result<bool> {
    let args = parse_args()?;
    let Some(pattern) = args.pattern.as_deref() else {
        anyhow::bail!("missing pattern\n{USAGE}");
    };
    let regex = build(&args, pattern)?;
    debug!("compiled {regex} with {} capture groups", regex.capture_count());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.info {
        for field in InfoField::all() {
            writeln!(out, "{}: {}", field.name(), regex.info(field))?;
        }
        return Ok(true);
    }

    let mut matched = 0usize;
    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read standard input")?;
        if args.only_matching {
            let mut found = false;
            let mut matches = regex.find_iter(&line);
            while let Some(caps) = matches.next() {
                let span = caps?.span();
                found = true;
                if span.is_empty() || args.count {
                    continue;
                }
                if let Some(text) = matches.subject().slice(span) {
                    writeln!(out, "{text}")?;
                }
            }
            matched += usize::from(found);
        } else if regex.is_match(&line)? {
            matched += 1;
            if !args.count {
                writeln!(out, "{line}")?;
            }
        }
    }
    if args.count {
        writeln!(out, "{matched}")?;
    }
    Ok(matched > 0)
}

// Usage: echo <input_text> | rexec -E <pattern>
fn main() {
    env_logger::init();
    match run() {
        Ok(true) => process::exit(0),
        Ok(false) => process::exit(1),
        Err(err) => {
            eprintln!("rexec: {err:#}");
            process::exit(2);
        }
    }
}
