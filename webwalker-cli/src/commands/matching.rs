//! `webwalker match`: template matching on image files.

use std::path::PathBuf;

use clap::Args;
use webwalker::matcher::{MatchCandidate, MatchPick, Template, TemplateMatcher, DEFAULT_MAX_RESULTS};

use super::open_image;
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct MatchArgs {
    /// Image to look for; transparent pixels are ignored
    #[arg(long)]
    pub needle: PathBuf,

    /// Image to search in
    #[arg(long)]
    pub haystack: PathBuf,

    /// Minimum correlation score
    #[arg(long, default_value_t = 0.8)]
    pub threshold: f32,

    /// Report every non-overlapping instance instead of the best one
    #[arg(long)]
    pub all: bool,

    /// Maximum instances reported with --all
    #[arg(long, default_value_t = DEFAULT_MAX_RESULTS)]
    pub limit: usize,
}

pub fn run(args: MatchArgs) -> Result<(), CliError> {
    let candidates = find(&args)?;
    if candidates.is_empty() {
        println!("No match above {:.2}", args.threshold);
    }
    for c in &candidates {
        println!(
            "x={} y={} w={} h={} score={:.4}",
            c.rect.x, c.rect.y, c.rect.width, c.rect.height, c.score
        );
    }
    Ok(())
}

fn find(args: &MatchArgs) -> Result<Vec<MatchCandidate>, CliError> {
    let needle = open_image(&args.needle)?;
    let haystack = open_image(&args.haystack)?;
    let matcher = TemplateMatcher::new();

    if args.all {
        let template = Template::from_rgba32f(&needle.to_rgba32f());
        Ok(matcher.match_all_limited(&template, &haystack.to_rgba32f(), args.threshold, args.limit))
    } else {
        Ok(matcher
            .find_masked(&needle, &haystack, args.threshold, MatchPick::Best)
            .into_iter()
            .collect())
    }
}
