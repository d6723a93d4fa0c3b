use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::coords::{CubeCoord, Direction};
use crate::types::{EdgeRef, NodeRef, Resource};

pub type NodeId = u16;
pub type EdgeId = (NodeId, NodeId);
pub type TileId = u16;

/// `None` is the generic 3:1 harbor, `Some(r)` the 2:1 harbor for `r`.
pub type PortKind = Option<Resource>;

type NodeMap = HashMap<NodeRef, NodeId>;
type EdgeMap = HashMap<EdgeRef, EdgeId>;

pub fn normalize_edge(a: NodeId, b: NodeId) -> EdgeId {
    if a <= b { (a, b) } else { (b, a) }
}

pub fn edge_contains_node(edge: EdgeId, node: NodeId) -> bool {
    edge.0 == node || edge.1 == node
}

/// The endpoint of `edge` that is not `node`.
pub fn other_end(edge: EdgeId, node: NodeId) -> NodeId {
    if edge.0 == node { edge.1 } else { edge.0 }
}

/// Ways to roll `number` with two dice, out of 36.
pub const fn dice_weight(number: u8) -> u32 {
    match number {
        2 | 12 => 1,
        3 | 11 => 2,
        4 | 10 => 3,
        5 | 9 => 4,
        6 | 8 => 5,
        7 => 6,
        _ => 0,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandTile {
    pub id: TileId,
    pub coord: CubeCoord,
    pub resource: Option<Resource>,
    pub number: Option<u8>,
    pub nodes: NodeMap,
    pub edges: EdgeMap,
}

impl LandTile {
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        NodeRef::iter().filter_map(|node_ref| self.nodes.get(&node_ref).copied())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    pub id: u16,
    pub resource: PortKind,
    pub direction: Direction,
    pub nodes: NodeMap,
    pub edges: EdgeMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Tile {
    Land(LandTile),
    Port(Port),
    Water { nodes: NodeMap, edges: EdgeMap },
}

impl Tile {
    fn nodes(&self) -> &NodeMap {
        match self {
            Tile::Land(tile) => &tile.nodes,
            Tile::Port(port) => &port.nodes,
            Tile::Water { nodes, .. } => nodes,
        }
    }

    fn edges(&self) -> &EdgeMap {
        match self {
            Tile::Land(tile) => &tile.edges,
            Tile::Port(port) => &port.edges,
            Tile::Water { edges, .. } => edges,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TileTemplate {
    Land,
    Water,
    Port(Direction),
}

#[derive(Debug, Clone)]
pub struct MapTemplate {
    pub numbers: Vec<u8>,
    pub port_resources: Vec<PortKind>,
    pub tile_resources: Vec<Option<Resource>>,
    pub topology: Vec<(CubeCoord, TileTemplate)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MapType {
    #[default]
    Base,
    Tournament,
    Mini,
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MapType::Base => "BASE",
            MapType::Tournament => "TOURNAMENT",
            MapType::Mini => "MINI",
        };
        write!(f, "{label}")
    }
}

impl FromStr for MapType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base" => Ok(MapType::Base),
            "tournament" => Ok(MapType::Tournament),
            "mini" => Ok(MapType::Mini),
            _ => Err(format!("unknown map type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MapShuffleOverrides<'a> {
    pub numbers: Option<&'a [u8]>,
    pub port_resources: Option<&'a [PortKind]>,
    pub tile_resources: Option<&'a [Option<Resource>]>,
}

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("template ran out of {0}")]
    TemplateExhausted(&'static str),
    #[error("tile at {0:?} is missing node {1:?}")]
    MissingNode(CubeCoord, NodeRef),
}

/// The static board graph. Only land edges are roads, only land nodes take buildings.
#[derive(Debug, Clone)]
pub struct CatanMap {
    pub tiles: HashMap<CubeCoord, Tile>,
    pub land_tiles: BTreeMap<TileId, LandTile>,
    pub port_nodes: HashMap<PortKind, BTreeSet<NodeId>>,
    pub land_nodes: BTreeSet<NodeId>,
    pub land_edges: BTreeSet<EdgeId>,
    pub adjacent_tiles: HashMap<NodeId, Vec<TileId>>,
    pub node_neighbors: HashMap<NodeId, BTreeSet<NodeId>>,
    pub node_edges: HashMap<NodeId, Vec<EdgeId>>,
}

impl CatanMap {
    pub fn from_template_with_rng(
        template: &MapTemplate,
        overrides: MapShuffleOverrides<'_>,
        rng: &mut impl rand::Rng,
    ) -> Result<Self, MapError> {
        let tiles = initialize_tiles(template, overrides, rng)?;
        Ok(Self::from_tiles(tiles))
    }

    pub fn from_tiles(tiles: HashMap<CubeCoord, Tile>) -> Self {
        let land_tiles: BTreeMap<TileId, LandTile> = tiles
            .values()
            .filter_map(|tile| match tile {
                Tile::Land(land) => Some((land.id, land.clone())),
                _ => None,
            })
            .collect();

        let mut port_nodes: HashMap<PortKind, BTreeSet<NodeId>> = HashMap::new();
        for tile in tiles.values() {
            if let Tile::Port(port) = tile {
                let (first_ref, second_ref) = port_node_refs(port.direction);
                for node_ref in [first_ref, second_ref] {
                    if let Some(node) = port.nodes.get(&node_ref) {
                        port_nodes.entry(port.resource).or_default().insert(*node);
                    }
                }
            }
        }

        let mut land_nodes = BTreeSet::new();
        let mut land_edges = BTreeSet::new();
        let mut adjacent_tiles: HashMap<NodeId, Vec<TileId>> = HashMap::new();
        for tile in land_tiles.values() {
            for node_id in tile.node_ids() {
                land_nodes.insert(node_id);
                adjacent_tiles.entry(node_id).or_default().push(tile.id);
            }
            for edge in tile.edges.values() {
                land_edges.insert(normalize_edge(edge.0, edge.1));
            }
        }

        let mut node_neighbors: HashMap<NodeId, BTreeSet<NodeId>> = HashMap::new();
        let mut node_edges: HashMap<NodeId, Vec<EdgeId>> = HashMap::new();
        for &(a, b) in &land_edges {
            node_neighbors.entry(a).or_default().insert(b);
            node_neighbors.entry(b).or_default().insert(a);
            node_edges.entry(a).or_default().push((a, b));
            node_edges.entry(b).or_default().push((a, b));
        }

        Self {
            tiles,
            land_tiles,
            port_nodes,
            land_nodes,
            land_edges,
            adjacent_tiles,
            node_neighbors,
            node_edges,
        }
    }

    pub fn build_with_rng(map_type: MapType, rng: &mut impl rand::Rng) -> Result<Self, MapError> {
        match map_type {
            MapType::Base => CatanMap::from_template_with_rng(
                &BASE_TEMPLATE,
                MapShuffleOverrides::default(),
                rng,
            ),
            MapType::Mini => CatanMap::from_template_with_rng(
                &MINI_TEMPLATE,
                MapShuffleOverrides::default(),
                rng,
            ),
            MapType::Tournament => CatanMap::from_template_with_rng(
                &BASE_TEMPLATE,
                MapShuffleOverrides {
                    numbers: Some(&TOURNAMENT_NUMBERS),
                    port_resources: Some(&TOURNAMENT_PORTS),
                    tile_resources: Some(&TOURNAMENT_TILES),
                },
                rng,
            ),
        }
    }

    pub fn tile(&self, id: TileId) -> Option<&LandTile> {
        self.land_tiles.get(&id)
    }

    pub fn neighbors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.node_neighbors.get(&node).into_iter().flatten().copied()
    }

    pub fn edges_of(&self, node: NodeId) -> &[EdgeId] {
        self.node_edges.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tiles_of(&self, node: NodeId) -> impl Iterator<Item = &LandTile> + '_ {
        self.adjacent_tiles
            .get(&node)
            .into_iter()
            .flatten()
            .filter_map(|id| self.land_tiles.get(id))
    }

    pub fn port_at(&self, node: NodeId) -> Option<PortKind> {
        self.port_nodes
            .iter()
            .find(|(_, nodes)| nodes.contains(&node))
            .map(|(kind, _)| *kind)
    }

    pub fn desert(&self) -> Option<TileId> {
        self.land_tiles
            .values()
            .find(|tile| tile.resource.is_none())
            .map(|tile| tile.id)
    }

    /// Nodes exactly two road-lengths away from `node`.
    pub fn nodes_two_away(&self, node: NodeId) -> BTreeSet<NodeId> {
        let mut result = BTreeSet::new();
        for middle in self.neighbors(node) {
            for far in self.neighbors(middle) {
                if far != node && !self.are_adjacent(node, far) {
                    result.insert(far);
                }
            }
        }
        result
    }

    pub fn are_adjacent(&self, a: NodeId, b: NodeId) -> bool {
        self.node_neighbors
            .get(&a)
            .is_some_and(|neighbors| neighbors.contains(&b))
    }
}

static TOURNAMENT_NUMBERS: Lazy<Vec<u8>> =
    Lazy::new(|| vec![10, 8, 3, 6, 2, 5, 10, 8, 4, 11, 12, 9, 5, 4, 9, 11, 3, 6]);

static TOURNAMENT_PORTS: Lazy<Vec<PortKind>> = Lazy::new(|| {
    vec![
        None,
        Some(Resource::Sheep),
        None,
        Some(Resource::Ore),
        Some(Resource::Wheat),
        None,
        Some(Resource::Wood),
        Some(Resource::Brick),
        None,
    ]
});

static TOURNAMENT_TILES: Lazy<Vec<Option<Resource>>> = Lazy::new(|| {
    use Resource::*;
    vec![
        None,
        Some(Wood),
        Some(Sheep),
        Some(Sheep),
        Some(Wood),
        Some(Wheat),
        Some(Wood),
        Some(Wheat),
        Some(Brick),
        Some(Sheep),
        Some(Brick),
        Some(Sheep),
        Some(Wheat),
        Some(Wheat),
        Some(Ore),
        Some(Brick),
        Some(Ore),
        Some(Wood),
        Some(Ore),
    ]
});

fn initialize_tiles(
    template: &MapTemplate,
    overrides: MapShuffleOverrides<'_>,
    rng: &mut impl rand::Rng,
) -> Result<HashMap<CubeCoord, Tile>, MapError> {
    let mut numbers = match overrides.numbers {
        Some(fixed) => fixed.to_vec(),
        None => {
            let mut numbers = template.numbers.clone();
            numbers.shuffle(rng);
            numbers
        }
    };
    let mut port_resources = match overrides.port_resources {
        Some(fixed) => fixed.to_vec(),
        None => {
            let mut ports = template.port_resources.clone();
            ports.shuffle(rng);
            ports
        }
    };
    let mut tile_resources = match overrides.tile_resources {
        Some(fixed) => fixed.to_vec(),
        None => {
            let mut resources = template.tile_resources.clone();
            resources.shuffle(rng);
            resources
        }
    };
    // fixed layouts are listed in placement order
    if overrides.numbers.is_some() {
        numbers.reverse();
    }
    if overrides.port_resources.is_some() {
        port_resources.reverse();
    }
    if overrides.tile_resources.is_some() {
        tile_resources.reverse();
    }

    let mut tiles: HashMap<CubeCoord, Tile> = HashMap::new();
    let mut node_autoinc: NodeId = 0;
    let mut land_autoinc: TileId = 0;
    let mut port_autoinc: u16 = 0;

    for (coord, template_kind) in &template.topology {
        let (nodes, edges) = nodes_and_edges(&tiles, *coord, &mut node_autoinc)?;
        match template_kind {
            TileTemplate::Land => {
                let resource = tile_resources
                    .pop()
                    .ok_or(MapError::TemplateExhausted("tile resources"))?;
                let number = match resource {
                    Some(_) => Some(numbers.pop().ok_or(MapError::TemplateExhausted("numbers"))?),
                    None => None,
                };
                tiles.insert(
                    *coord,
                    Tile::Land(LandTile {
                        id: land_autoinc,
                        coord: *coord,
                        resource,
                        number,
                        nodes,
                        edges,
                    }),
                );
                land_autoinc += 1;
            }
            TileTemplate::Water => {
                tiles.insert(*coord, Tile::Water { nodes, edges });
            }
            TileTemplate::Port(direction) => {
                let resource = port_resources
                    .pop()
                    .ok_or(MapError::TemplateExhausted("port resources"))?;
                tiles.insert(
                    *coord,
                    Tile::Port(Port {
                        id: port_autoinc,
                        resource,
                        direction: *direction,
                        nodes,
                        edges,
                    }),
                );
                port_autoinc += 1;
            }
        }
    }

    Ok(tiles)
}

/// Node refs shared with the neighbor in `direction`, as (ours, theirs) pairs, plus the shared edge.
fn shared_with(direction: Direction) -> ([(NodeRef, NodeRef); 2], (EdgeRef, EdgeRef)) {
    use NodeRef as N;
    match direction {
        Direction::East => (
            [(N::NorthEast, N::NorthWest), (N::SouthEast, N::SouthWest)],
            (EdgeRef::East, EdgeRef::West),
        ),
        Direction::SouthEast => (
            [(N::South, N::NorthWest), (N::SouthEast, N::North)],
            (EdgeRef::SouthEast, EdgeRef::NorthWest),
        ),
        Direction::SouthWest => (
            [(N::South, N::NorthEast), (N::SouthWest, N::North)],
            (EdgeRef::SouthWest, EdgeRef::NorthEast),
        ),
        Direction::West => (
            [(N::NorthWest, N::NorthEast), (N::SouthWest, N::SouthEast)],
            (EdgeRef::West, EdgeRef::East),
        ),
        Direction::NorthWest => (
            [(N::North, N::SouthEast), (N::NorthWest, N::South)],
            (EdgeRef::NorthWest, EdgeRef::SouthEast),
        ),
        Direction::NorthEast => (
            [(N::North, N::SouthWest), (N::NorthEast, N::South)],
            (EdgeRef::NorthEast, EdgeRef::SouthWest),
        ),
    }
}

fn nodes_and_edges(
    tiles: &HashMap<CubeCoord, Tile>,
    coordinate: CubeCoord,
    node_autoinc: &mut NodeId,
) -> Result<(NodeMap, EdgeMap), MapError> {
    let mut nodes: NodeMap = HashMap::new();
    let mut edges: EdgeMap = HashMap::new();

    for direction in Direction::iter() {
        let Some(neighbor) = tiles.get(&coordinate.neighbor(direction)) else {
            continue;
        };
        let (node_pairs, (ours, theirs)) = shared_with(direction);
        for (our_ref, their_ref) in node_pairs {
            if let Some(id) = neighbor.nodes().get(&their_ref) {
                nodes.insert(our_ref, *id);
            }
        }
        if let Some(edge) = neighbor.edges().get(&theirs) {
            edges.insert(ours, *edge);
        }
    }

    // fixed iteration order keeps node ids stable between runs
    for node_ref in NodeRef::iter() {
        if !nodes.contains_key(&node_ref) {
            nodes.insert(node_ref, *node_autoinc);
            *node_autoinc += 1;
        }
    }

    for edge_ref in EdgeRef::iter() {
        if edges.contains_key(&edge_ref) {
            continue;
        }
        let (a_ref, b_ref) = edge_node_refs(edge_ref);
        let a = *nodes
            .get(&a_ref)
            .ok_or(MapError::MissingNode(coordinate, a_ref))?;
        let b = *nodes
            .get(&b_ref)
            .ok_or(MapError::MissingNode(coordinate, b_ref))?;
        edges.insert(edge_ref, normalize_edge(a, b));
    }

    Ok((nodes, edges))
}

fn edge_node_refs(edge_ref: EdgeRef) -> (NodeRef, NodeRef) {
    match edge_ref {
        EdgeRef::East => (NodeRef::NorthEast, NodeRef::SouthEast),
        EdgeRef::SouthEast => (NodeRef::SouthEast, NodeRef::South),
        EdgeRef::SouthWest => (NodeRef::South, NodeRef::SouthWest),
        EdgeRef::West => (NodeRef::SouthWest, NodeRef::NorthWest),
        EdgeRef::NorthWest => (NodeRef::NorthWest, NodeRef::North),
        EdgeRef::NorthEast => (NodeRef::North, NodeRef::NorthEast),
    }
}

fn port_node_refs(direction: Direction) -> (NodeRef, NodeRef) {
    match direction {
        Direction::West => (NodeRef::NorthWest, NodeRef::SouthWest),
        Direction::NorthWest => (NodeRef::North, NodeRef::NorthWest),
        Direction::NorthEast => (NodeRef::NorthEast, NodeRef::North),
        Direction::East => (NodeRef::SouthEast, NodeRef::NorthEast),
        Direction::SouthEast => (NodeRef::South, NodeRef::SouthEast),
        Direction::SouthWest => (NodeRef::SouthWest, NodeRef::South),
    }
}

static BASE_TEMPLATE: Lazy<MapTemplate> = Lazy::new(|| {
    use Resource::*;
    let mut tile_resources = Vec::with_capacity(19);
    for (resource, count) in [(Wood, 4), (Brick, 3), (Sheep, 4), (Wheat, 4), (Ore, 3)] {
        tile_resources.extend(std::iter::repeat(Some(resource)).take(count));
    }
    tile_resources.push(None);
    MapTemplate {
        numbers: vec![2, 3, 3, 4, 4, 5, 5, 6, 6, 8, 8, 9, 9, 10, 10, 11, 11, 12],
        port_resources: vec![
            Some(Wood),
            Some(Brick),
            Some(Sheep),
            Some(Wheat),
            Some(Ore),
            None,
            None,
            None,
            None,
        ],
        tile_resources,
        topology: base_topology(),
    }
});

static MINI_TEMPLATE: Lazy<MapTemplate> = Lazy::new(|| MapTemplate {
    numbers: vec![3, 4, 5, 6, 8, 9, 10],
    port_resources: vec![],
    tile_resources: vec![
        Some(Resource::Wood),
        None,
        Some(Resource::Brick),
        Some(Resource::Sheep),
        Some(Resource::Wheat),
        Some(Resource::Wheat),
        Some(Resource::Ore),
    ],
    topology: mini_topology(),
});

fn base_topology() -> Vec<(CubeCoord, TileTemplate)> {
    use TileTemplate::*;
    let mut topology: Vec<(CubeCoord, TileTemplate)> = [
        (0, 0, 0),
        (1, -1, 0),
        (0, -1, 1),
        (-1, 0, 1),
        (-1, 1, 0),
        (0, 1, -1),
        (1, 0, -1),
        (2, -2, 0),
        (1, -2, 1),
        (0, -2, 2),
        (-1, -1, 2),
        (-2, 0, 2),
        (-2, 1, 1),
        (-2, 2, 0),
        (-1, 2, -1),
        (0, 2, -2),
        (1, 1, -2),
        (2, 0, -2),
        (2, -1, -1),
    ]
    .into_iter()
    .map(|(x, y, z)| (CubeCoord::new(x, y, z), Land))
    .collect();
    topology.extend([
        (CubeCoord::new(3, -3, 0), Port(Direction::West)),
        (CubeCoord::new(2, -3, 1), Water),
        (CubeCoord::new(1, -3, 2), Port(Direction::NorthWest)),
        (CubeCoord::new(0, -3, 3), Water),
        (CubeCoord::new(-1, -2, 3), Port(Direction::NorthWest)),
        (CubeCoord::new(-2, -1, 3), Water),
        (CubeCoord::new(-3, 0, 3), Port(Direction::NorthEast)),
        (CubeCoord::new(-3, 1, 2), Water),
        (CubeCoord::new(-3, 2, 1), Port(Direction::East)),
        (CubeCoord::new(-3, 3, 0), Water),
        (CubeCoord::new(-2, 3, -1), Port(Direction::East)),
        (CubeCoord::new(-1, 3, -2), Water),
        (CubeCoord::new(0, 3, -3), Port(Direction::SouthEast)),
        (CubeCoord::new(1, 2, -3), Water),
        (CubeCoord::new(2, 1, -3), Port(Direction::SouthWest)),
        (CubeCoord::new(3, 0, -3), Water),
        (CubeCoord::new(3, -1, -2), Port(Direction::SouthWest)),
        (CubeCoord::new(3, -2, -1), Water),
    ]);
    topology
}

fn mini_topology() -> Vec<(CubeCoord, TileTemplate)> {
    base_topology()
        .into_iter()
        .take(19)
        .enumerate()
        .map(|(idx, (coord, kind))| if idx < 7 { (coord, kind) } else { (coord, TileTemplate::Water) })
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn base_map(seed: u64) -> CatanMap {
        let mut rng = StdRng::seed_from_u64(seed);
        CatanMap::build_with_rng(MapType::Base, &mut rng).expect("base map builds")
    }

    #[test]
    fn base_map_has_standard_graph_size() {
        let map = base_map(7);
        assert_eq!(map.land_tiles.len(), 19);
        assert_eq!(map.land_nodes.len(), 54);
        assert_eq!(map.land_edges.len(), 72);
        assert_eq!(map.port_nodes.values().map(BTreeSet::len).sum::<usize>(), 18);
    }

    #[test]
    fn node_ids_do_not_depend_on_hash_order() {
        let a = base_map(3);
        let b = base_map(3);
        assert_eq!(a.land_edges, b.land_edges);
        for id in a.land_tiles.keys() {
            assert_eq!(a.land_tiles[id].number, b.land_tiles[id].number);
            assert_eq!(
                a.land_tiles[id].node_ids().collect::<Vec<_>>(),
                b.land_tiles[id].node_ids().collect::<Vec<_>>()
            );
        }
    }

    #[test]
    fn tournament_layout_is_fixed() {
        let mut rng = StdRng::seed_from_u64(1);
        let map = CatanMap::build_with_rng(MapType::Tournament, &mut rng).expect("builds");
        let first = map.tile(0).expect("tile 0");
        assert_eq!(first.resource, None);
        assert_eq!(first.number, None);
        let second = map.tile(1).expect("tile 1");
        assert_eq!(second.resource, Some(Resource::Wood));
        assert_eq!(second.number, Some(10));
    }

    #[test]
    fn two_away_nodes_are_not_neighbors() {
        let map = base_map(11);
        let node = *map.land_nodes.iter().next().expect("a node");
        for far in map.nodes_two_away(node) {
            assert!(!map.are_adjacent(node, far));
            assert_ne!(far, node);
        }
    }
}
