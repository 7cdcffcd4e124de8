//! `webwalker path`: tile path between two tiles.

use std::path::PathBuf;

use clap::Args;
use webwalker::config::ConfigFile;
use webwalker::coord::Tile;
use webwalker::graph::NavigationGraph;

use crate::error::CliError;

#[derive(Debug, Args)]
pub struct PathArgs {
    /// Navigation graph JSON (defaults to [navigation] graph)
    #[arg(long)]
    pub graph: Option<PathBuf>,

    /// Start tile as x,y or x,y,plane
    #[arg(long)]
    pub from: Tile,

    /// Destination tile as x,y or x,y,plane
    #[arg(long)]
    pub to: Tile,

    /// Append the exact destination after the last graph node
    #[arg(long)]
    pub include_destination: bool,
}

pub fn run(args: PathArgs, config: &ConfigFile) -> Result<(), CliError> {
    let tiles = build(&args, config)?;
    println!("{} points", tiles.len());
    for (i, tile) in tiles.iter().enumerate() {
        println!("{:4}  {}", i, tile);
    }
    Ok(())
}

fn build(args: &PathArgs, config: &ConfigFile) -> Result<Vec<Tile>, CliError> {
    let path = args
        .graph
        .clone()
        .or_else(|| config.navigation.graph.clone())
        .ok_or_else(|| {
            CliError::Usage(
                "No navigation graph. Pass --graph or set [navigation] graph in config.ini"
                    .to_string(),
            )
        })?;

    let graph = NavigationGraph::load(&path)?.with_search_radius(config.navigation.search_radius);
    Ok(graph.build_tile_path(args.from, args.to, args.include_destination)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAPH: &str = r#"{
        "nodes": [
            {"id": 1, "x": 0, "y": 0, "z": 0},
            {"id": 2, "x": 10, "y": 0, "z": 0},
            {"id": 3, "x": 10, "y": 10, "z": 0},
            {"id": 4, "x": 90, "y": 90, "z": 0}
        ],
        "edges": [
            {"start_id": 1, "end_id": 2},
            {"start_id": 2, "end_id": 3}
        ]
    }"#;

    fn args(graph: PathBuf, to: Tile) -> PathArgs {
        PathArgs {
            graph: Some(graph),
            from: Tile::new(1, 0, 0),
            to,
            include_destination: true,
        }
    }

    #[test]
    fn test_build_path_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("graph.json");
        std::fs::write(&file, GRAPH).unwrap();

        let tiles = build(&args(file, Tile::new(11, 11, 0)), &ConfigFile::default()).unwrap();
        assert_eq!(
            tiles,
            vec![
                Tile::new(0, 0, 0),
                Tile::new(10, 0, 0),
                Tile::new(10, 10, 0),
                Tile::new(11, 11, 0)
            ]
        );
    }

    #[test]
    fn test_unreachable_destination() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("graph.json");
        std::fs::write(&file, GRAPH).unwrap();

        let err = build(&args(file, Tile::new(90, 91, 0)), &ConfigFile::default()).unwrap_err();
        assert!(matches!(err, CliError::Navigation(_)));
    }

    #[test]
    fn test_graph_required() {
        let args = PathArgs {
            graph: None,
            from: Tile::new(0, 0, 0),
            to: Tile::new(1, 1, 0),
            include_destination: false,
        };
        assert!(matches!(
            build(&args, &ConfigFile::default()),
            Err(CliError::Usage(_))
        ));
    }
}
