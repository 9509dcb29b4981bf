//
// Hashiwokakero (bridges) puzzle solver
//
// Backtracking search over bridge placements, with a forced-move
// heuristic pass up front to shrink the search space.
//

use std::collections::HashMap;
use std::fs::File;
use std::io::{stdin, BufReader, Read};

use anyhow::{ensure, Result};
use clap::Parser;
use thiserror::Error;

////////////////////////////////////////////////////////////////////////
// Data structures / problem representation
//

// There are 4 directions from an island.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Direction {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

const ALL_DIRS: &[Direction] = &[
    Direction::North,
    Direction::East,
    Direction::South,
    Direction::West,
];

// The (x, y) steps to move N E S W respectively.
const DIRECTION_STEPS: &[(isize, isize); 4] = &[(0, -1), (1, 0), (0, 1), (-1, 0)];

impl Direction {
    fn step(&self) -> (isize, isize) {
        DIRECTION_STEPS[*self as usize]
    }

    fn is_horizontal(&self) -> bool {
        matches!(*self, Direction::East | Direction::West)
    }
}

// Islands and bridges are stored in growable arenas and referred to by
// stable index. Nothing is ever removed, so indices never dangle.
type IslandId = usize;

// An island sits at a fixed grid cell and needs exactly `capacity`
// bridge endpoints. `wired` counts the endpoints attached so far;
// `remaining` caches `capacity - wired` and is kept up to date by the
// ledger operations. Up to one neighbour per compass direction: the
// nearest island in that direction with nothing in between.
#[derive(Clone, Debug, Eq, PartialEq)]
struct Island {
    x: usize,
    y: usize,
    capacity: usize,
    wired: usize,
    remaining: usize,
    neighbours: [Option<IslandId>; 4],
}

impl Island {
    fn neighbour(&self, dir: Direction) -> Option<IslandId> {
        self.neighbours[dir as usize]
    }
}

// A bridge joins an unordered pair of islands and carries `wires`
// parallel strands. `dir` is the direction from `a` to `b`, used for
// rendering and the crossing geometry. A record whose wire count has
// dropped back to zero is inert: it stays in the arena but takes no
// part in crossing checks or rendering.
#[derive(Clone, Debug, Eq, PartialEq)]
struct Bridge {
    a: IslandId,
    b: IslandId,
    dir: Direction,
    wires: usize,
    symbol: char,
}

impl Bridge {
    fn is_active(&self) -> bool {
        self.wires > 0
    }

    fn joins(&self, i: IslandId, j: IslandId) -> bool {
        (self.a == i && self.b == j) || (self.a == j && self.b == i)
    }
}

// The whole puzzle: grid dimensions, island arena in row-major parse
// order, bridge arena, and the wire counters used for the fast
// termination check. `target_wires` is the capacity sum halved, since
// each wire consumes an endpoint at both islands.
#[derive(Clone, Debug, Eq, PartialEq)]
struct Puzzle {
    rows: usize,
    cols: usize,
    islands: Vec<Island>,
    bridges: Vec<Bridge>,
    max_wires: usize,
    target_wires: usize,
    built_wires: usize,
}

#[derive(Debug, Eq, Error, PartialEq)]
enum ParseError {
    #[error("empty puzzle grid")]
    EmptyGrid,
    #[error("no islands in puzzle grid")]
    NoIslands,
}

////////////////////////////////////////////////////////////////////////
// Board parser
//

// Digits 1-9 are islands of that capacity, letters a-c are capacities
// 10-12, anything else is water.
fn island_capacity(c: char) -> Option<usize> {
    match c {
        '1'..='9' => Some(c as usize - '0' as usize),
        'a'..='c' => Some(10 + c as usize - 'a' as usize),
        _ => None,
    }
}

impl Puzzle {
    fn parse(text: &str, max_wires: usize) -> Result<Puzzle, ParseError> {
        let lines: Vec<&str> = text.lines().collect();
        let rows = lines.len();
        let cols = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        if rows == 0 || cols == 0 {
            return Err(ParseError::EmptyGrid);
        }

        // Width is that of the longest row; short rows pad out as water.
        let mut grid = vec![vec![' '; cols]; rows];
        for (y, line) in lines.iter().enumerate() {
            for (x, c) in line.chars().enumerate() {
                grid[y][x] = c;
            }
        }

        let mut islands: Vec<Island> = Vec::new();
        let mut island_at: HashMap<(usize, usize), IslandId> = HashMap::new();
        for (y, row) in grid.iter().enumerate() {
            for (x, &c) in row.iter().enumerate() {
                if let Some(capacity) = island_capacity(c) {
                    island_at.insert((x, y), islands.len());
                    islands.push(Island {
                        x,
                        y,
                        capacity,
                        wired: 0,
                        remaining: capacity,
                        neighbours: [None; 4],
                    });
                }
            }
        }
        if islands.is_empty() {
            return Err(ParseError::NoIslands);
        }

        // Link each island to the nearest island in each direction.
        // Scanning stops at the first island found, so a link never
        // jumps over an intervening island, and the links come out
        // symmetric without further work.
        for id in 0..islands.len() {
            for dir in ALL_DIRS.iter() {
                let (step_x, step_y) = dir.step();
                let (mut x, mut y) = (islands[id].x as isize, islands[id].y as isize);
                loop {
                    x += step_x;
                    y += step_y;
                    if x < 0 || x >= cols as isize || y < 0 || y >= rows as isize {
                        break;
                    }
                    if let Some(&nb) = island_at.get(&(x as usize, y as usize)) {
                        islands[id].neighbours[*dir as usize] = Some(nb);
                        break;
                    }
                }
            }
        }

        let target_wires = islands.iter().map(|i| i.capacity).sum::<usize>() / 2;

        Ok(Puzzle {
            rows,
            cols,
            islands,
            bridges: Vec::new(),
            max_wires,
            target_wires,
            built_wires: 0,
        })
    }
}

////////////////////////////////////////////////////////////////////////
// Bridge ledger
//

fn wire_symbol(dir: Direction, wires: usize) -> char {
    match (dir.is_horizontal(), wires) {
        (true, 1) => '-',
        (true, 2) => '=',
        (true, 3) => 'E',
        (false, 1) => '|',
        (false, 2) => '"',
        (false, 3) => '#',
        _ => ' ',
    }
}

impl Puzzle {
    // At most one record exists per unordered island pair.
    fn bridge_between(&self, a: IslandId, b: IslandId) -> Option<usize> {
        self.bridges.iter().position(|bridge| bridge.joins(a, b))
    }

    fn get_or_create_bridge(&mut self, a: IslandId, b: IslandId, dir: Direction) -> usize {
        if let Some(idx) = self.bridge_between(a, b) {
            return idx;
        }
        self.bridges.push(Bridge {
            a,
            b,
            dir,
            wires: 0,
            symbol: ' ',
        });
        self.bridges.len() - 1
    }

    // Add one wire between an island and its neighbour in `dir`. The
    // caller must already have checked `can_build_bridge`; only the
    // wire ceiling is re-asserted here.
    fn add_wire(&mut self, from: IslandId, dir: Direction) {
        let to = self.islands[from]
            .neighbour(dir)
            .expect("add_wire: no neighbour in that direction");
        let ceiling = self.max_wires;
        let idx = self.get_or_create_bridge(from, to, dir);
        let bridge = &mut self.bridges[idx];
        assert!(bridge.wires < ceiling, "add_wire: wire ceiling exceeded");
        bridge.wires += 1;
        bridge.symbol = wire_symbol(bridge.dir, bridge.wires);
        self.built_wires += 1;
        for &id in [from, to].iter() {
            let isle = &mut self.islands[id];
            isle.wired += 1;
            assert!(isle.wired <= isle.capacity);
            isle.remaining = isle.capacity - isle.wired;
        }
    }

    // Exact inverse of add_wire. At zero wires the record goes inert
    // rather than being deleted.
    fn remove_wire(&mut self, from: IslandId, dir: Direction) {
        let to = self.islands[from]
            .neighbour(dir)
            .expect("remove_wire: no neighbour in that direction");
        let idx = self
            .bridge_between(from, to)
            .expect("remove_wire: no bridge for pair");
        let bridge = &mut self.bridges[idx];
        assert!(bridge.wires > 0, "remove_wire: no wires to remove");
        bridge.wires -= 1;
        bridge.symbol = wire_symbol(bridge.dir, bridge.wires);
        self.built_wires -= 1;
        for &id in [from, to].iter() {
            let isle = &mut self.islands[id];
            isle.wired -= 1;
            isle.remaining = isle.capacity - isle.wired;
        }
    }
}

////////////////////////////////////////////////////////////////////////
// Feasibility checking
//

impl Puzzle {
    fn cell_index(&self, x: usize, y: usize) -> usize {
        y * self.cols + x
    }

    // The cells strictly between two islands, walking from `a` towards
    // `b`. Endpoints are excluded.
    fn interior_cells(&self, a: IslandId, b: IslandId, dir: Direction) -> Vec<(usize, usize)> {
        let (step_x, step_y) = dir.step();
        let (mut x, mut y) = (self.islands[a].x as isize, self.islands[a].y as isize);
        let (end_x, end_y) = (self.islands[b].x as isize, self.islands[b].y as isize);
        let mut cells = Vec::new();
        loop {
            x += step_x;
            y += step_y;
            if (x, y) == (end_x, end_y) {
                return cells;
            }
            cells.push((x as usize, y as usize));
        }
    }

    // Occupancy mask over the grid: island cells plus the interior
    // cells of every active bridge. Inert records contribute nothing.
    fn occupancy(&self) -> Vec<bool> {
        let mut occupied = vec![false; self.rows * self.cols];
        for isle in &self.islands {
            occupied[self.cell_index(isle.x, isle.y)] = true;
        }
        for bridge in self.bridges.iter().filter(|b| b.is_active()) {
            for (x, y) in self.interior_cells(bridge.a, bridge.b, bridge.dir) {
                occupied[self.cell_index(x, y)] = true;
            }
        }
        occupied
    }

    // Pure predicate: may one more wire legally be added from `from`
    // towards `dir`? No side effects, safe to call speculatively.
    fn can_build_bridge(&self, from: IslandId, dir: Direction) -> bool {
        let to = match self.islands[from].neighbour(dir) {
            Some(to) => to,
            None => return false,
        };
        // Forward check on capacity.
        if self.islands[from].remaining == 0 || self.islands[to].remaining == 0 {
            return false;
        }
        // An active bridge's path is already known to be clear, so only
        // the wire ceiling matters. An inert record proves nothing and
        // falls through to the geometric check.
        if let Some(idx) = self.bridge_between(from, to) {
            let bridge = &self.bridges[idx];
            if bridge.is_active() {
                return bridge.wires < self.max_wires;
            }
        }
        let occupied = self.occupancy();
        self.interior_cells(from, to, dir)
            .iter()
            .all(|&(x, y)| !occupied[self.cell_index(x, y)])
    }
}

////////////////////////////////////////////////////////////////////////
// Heuristic forced moves
//

impl Puzzle {
    fn try_forced_wire(&mut self, id: IslandId, dir: Direction) {
        if self.can_build_bridge(id, dir) {
            self.add_wire(id, dir);
        }
    }

    // One deterministic pass over the islands, placing wires that must
    // exist in any solution. Placements are never retracted. This
    // narrows the search space but is not full constraint propagation;
    // whatever is left over goes to the backtracking engine.
    fn apply_forced_moves(&mut self) {
        for id in 0..self.islands.len() {
            let capacity = self.islands[id].capacity;
            let dirs: Vec<Direction> = ALL_DIRS
                .iter()
                .cloned()
                .filter(|&d| self.islands[id].neighbour(d).is_some())
                .collect();

            // Letter islands need a connection to nearly every
            // neighbour: one all-directions round per point of
            // capacity above 9.
            if capacity >= 10 {
                for _ in 9..capacity {
                    for &dir in &dirs {
                        self.try_forced_wire(id, dir);
                    }
                }
            }

            match dirs.len() {
                // A single neighbour must absorb the full capacity.
                1 => {
                    for _ in 0..capacity {
                        self.try_forced_wire(id, dirs[0]);
                    }
                }
                // Two neighbours: capacity 4 forces both directions
                // used, each further point doubles one up.
                2 => {
                    for &threshold in &[4, 5, 6] {
                        if capacity >= threshold {
                            for &dir in &dirs {
                                self.try_forced_wire(id, dir);
                            }
                        }
                    }
                }
                // Three neighbours, analogous escalation.
                3 => {
                    for &threshold in &[7, 8, 9] {
                        if capacity >= threshold {
                            for &dir in &dirs {
                                self.try_forced_wire(id, dir);
                            }
                        }
                    }
                }
                _ => (),
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////
// Backtracking search
//

impl Puzzle {
    fn is_fully_satisfied(&self) -> bool {
        self.islands.iter().all(|isle| isle.remaining == 0)
    }

    fn has_legal_move(&self, id: IslandId) -> bool {
        ALL_DIRS.iter().any(|&dir| self.can_build_bridge(id, dir))
    }

    // One-step look-ahead: tentatively place the wire and check that
    // neither endpoint is left unsatisfied with no legal move. The
    // tentative wire is always undone before returning.
    fn move_keeps_options(&mut self, from: IslandId, dir: Direction) -> bool {
        let to = self.islands[from]
            .neighbour(dir)
            .expect("move_keeps_options: no neighbour in that direction");
        self.add_wire(from, dir);
        let ok = (self.islands[from].remaining == 0 || self.has_legal_move(from))
            && (self.islands[to].remaining == 0 || self.has_legal_move(to));
        self.remove_wire(from, dir);
        ok
    }

    // Depth-first search: commit a wire, recurse, retract on failure.
    // Every recursion level adds exactly one wire and the wire count is
    // bounded by target_wires, so the search terminates without any
    // attempt-count safety valve. Failure means the search found no
    // solution, not that none exists beyond the pruning's reach.
    fn solve(&mut self) -> bool {
        if self.built_wires == self.target_wires {
            return self.is_fully_satisfied();
        }
        for id in 0..self.islands.len() {
            for &dir in ALL_DIRS.iter() {
                if self.can_build_bridge(id, dir) && self.move_keeps_options(id, dir) {
                    self.add_wire(id, dir);
                    if self.solve() {
                        return true;
                    }
                    self.remove_wire(id, dir);
                }
            }
        }
        false
    }
}

////////////////////////////////////////////////////////////////////////
// Renderer
//

fn capacity_glyph(capacity: usize) -> char {
    match capacity {
        1..=9 => std::char::from_digit(capacity as u32, 10).unwrap(),
        10..=12 => (b'a' + (capacity - 10) as u8) as char,
        _ => '?',
    }
}

impl Puzzle {
    // Project the islands and active bridges back onto a character
    // grid. One line per row, one character per column.
    fn render(&self) -> String {
        let mut grid = vec![vec![' '; self.cols]; self.rows];
        for isle in &self.islands {
            grid[isle.y][isle.x] = capacity_glyph(isle.capacity);
        }
        for bridge in self.bridges.iter().filter(|b| b.is_active()) {
            for (x, y) in self.interior_cells(bridge.a, bridge.b, bridge.dir) {
                grid[y][x] = bridge.symbol;
            }
        }
        grid.iter()
            .map(|row| row.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

////////////////////////////////////////////////////////////////////////
// Main entry point
//

#[derive(Parser)]
#[clap(version = "0.1.0", about = "Hashiwokakero (Bridges) puzzle solver")]
struct Opts {
    /// Input puzzle file. Reads stdin if none specified.
    input: Option<String>,
    /// Maximum number of parallel wires between a pair of islands.
    /// Canonical Hashiwokakero uses 2; 3 is supported as a variant.
    #[clap(long, default_value = "2")]
    max_wires: usize,
}

fn read_input(opts: &Opts) -> Result<String> {
    let file: Box<dyn Read> = match &opts.input {
        Some(name) => Box::new(File::open(name)?),
        None => Box::new(stdin()),
    };
    let mut text = String::new();
    BufReader::new(file).read_to_string(&mut text)?;
    Ok(text)
}

fn main() -> Result<()> {
    let opts: Opts = Opts::parse();

    ensure!(
        (1..=3).contains(&opts.max_wires),
        "--max-wires must be between 1 and 3"
    );

    let mut puzzle = Puzzle::parse(&read_input(&opts)?, opts.max_wires)?;

    puzzle.apply_forced_moves();
    if puzzle.solve() {
        println!("{}", puzzle.render());
    } else {
        eprintln!("No solution found");
        // Partial state as a diagnostic.
        eprintln!("{}", puzzle.render());
    }

    Ok(())
}

////////////////////////////////////////////////////////////////////////
// Tests
//

#[cfg(test)]
const DEFAULT_MAX_WIRES: usize = 2;
