use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, StatsError};

pub const SLOTS_PER_TEAM: usize = 8;

pub const MATCH_ID_COLUMN: &str = "Match ID";
pub const PLAYER_ID_COLUMN: &str = "player_id";
pub const PLAYER_NAME_COLUMN: &str = "player_name";

pub type PlayerKeys = BTreeMap<u32, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Outcome {
    Win,
    Draw,
    Loss,
}

impl Outcome {
    /// Parses the loose textual codes found in match logs ("1", "1.0", "0.5", "0").
    pub fn parse(raw: &str) -> Option<Self> {
        let value = raw.trim().parse::<f64>().ok()?;
        Self::from_code(value)
    }

    pub fn from_code(value: f64) -> Option<Self> {
        if value == 1.0 {
            Some(Self::Win)
        } else if value == 0.5 {
            Some(Self::Draw)
        } else if value == 0.0 {
            Some(Self::Loss)
        } else {
            None
        }
    }

    pub fn code(self) -> f64 {
        match self {
            Self::Win => 1.0,
            Self::Draw => 0.5,
            Self::Loss => 0.0,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Self::Win => 'W',
            Self::Draw => 'D',
            Self::Loss => 'L',
        }
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.code())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCode {
    Number(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for Outcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let parsed = match RawCode::deserialize(deserializer)? {
            RawCode::Number(value) => Outcome::from_code(value),
            RawCode::Text(text) => Outcome::parse(&text),
        };
        parsed.ok_or_else(|| serde::de::Error::custom("result code must be 1, 0.5 or 0"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TeamSide {
    One,
    Two,
}

impl TeamSide {
    pub const BOTH: [TeamSide; 2] = [TeamSide::One, TeamSide::Two];

    pub fn label(self) -> &'static str {
        match self {
            Self::One => "Team 1",
            Self::Two => "Team 2",
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamSheet {
    /// Player ids by slot; 0 marks an empty slot.
    pub players: [u32; SLOTS_PER_TEAM],
    pub goals: u32,
    pub result: Outcome,
}

impl TeamSheet {
    pub fn present(&self) -> impl Iterator<Item = u32> + '_ {
        self.players.iter().copied().filter(|id| *id != 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRow {
    pub match_id: u32,
    pub team1: TeamSheet,
    pub team2: TeamSheet,
}

impl MatchRow {
    pub fn side(&self, side: TeamSide) -> &TeamSheet {
        match side {
            TeamSide::One => &self.team1,
            TeamSide::Two => &self.team2,
        }
    }
}

pub fn match_log_columns() -> Vec<String> {
    let mut cols = vec![MATCH_ID_COLUMN.to_string()];
    for side in TeamSide::BOTH {
        for slot in 1..=SLOTS_PER_TEAM {
            cols.push(slot_column(side, slot));
        }
    }
    for side in TeamSide::BOTH {
        cols.push(goals_column(side));
    }
    for side in TeamSide::BOTH {
        cols.push(result_column(side));
    }
    cols
}

pub fn player_key_columns() -> Vec<String> {
    vec![PLAYER_ID_COLUMN.to_string(), PLAYER_NAME_COLUMN.to_string()]
}

fn slot_column(side: TeamSide, slot: usize) -> String {
    format!("{} P{slot}", side.label())
}

fn goals_column(side: TeamSide) -> String {
    format!("{} Goals", side.label())
}

fn result_column(side: TeamSide) -> String {
    format!("{} Result", side.label())
}

/// Reads an input file, mapping absence and blank content onto the
/// not-configured errors.
pub fn read_input_bytes(path: &Path) -> Result<Vec<u8>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(StatsError::MissingInput {
                path: path.to_path_buf(),
            });
        }
        Err(err) => return Err(StatsError::io(path, err)),
    };
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(StatsError::EmptyInput {
            path: path.to_path_buf(),
        });
    }
    Ok(bytes)
}

pub fn read_match_log(path: &Path) -> Result<Vec<MatchRow>> {
    let bytes = read_input_bytes(path)?;
    parse_match_log(bytes.as_slice(), path)
}

/// Parses and validates a match log. `source` is only used to label errors.
pub fn parse_match_log<R: Read>(reader: R, source: &Path) -> Result<Vec<MatchRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let columns = column_map(&headers, &match_log_columns())?;

    let mut rows = Vec::new();
    let mut seen_ids = HashSet::new();
    for record in rdr.records() {
        let record = record?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        let row = parse_match_row(&record, &columns)?;
        if !seen_ids.insert(row.match_id) {
            return Err(StatsError::bad_row(row.match_id, "duplicate match id"));
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(StatsError::EmptyInput {
            path: source.to_path_buf(),
        });
    }
    Ok(rows)
}

pub fn read_player_keys(path: &Path) -> Result<PlayerKeys> {
    let bytes = read_input_bytes(path)?;
    parse_player_keys(bytes.as_slice(), path)
}

pub fn parse_player_keys<R: Read>(reader: R, source: &Path) -> Result<PlayerKeys> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let columns = column_map(&headers, &player_key_columns())?;
    let id_idx = columns[PLAYER_ID_COLUMN];
    let name_idx = columns[PLAYER_NAME_COLUMN];

    let mut keys = PlayerKeys::new();
    for record in rdr.records() {
        let record = record?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let (Some(raw_id), Some(raw_name)) = (record.get(id_idx), record.get(name_idx)) else {
            return Err(StatsError::data_format(format!(
                "line {line}: player keys row is missing fields"
            )));
        };
        let player_id = parse_whole_number(raw_id).ok_or_else(|| {
            StatsError::data_format(format!("invalid player id '{raw_id}' in player keys"))
        })?;
        if keys.insert(player_id, raw_name.to_string()).is_some() {
            return Err(StatsError::data_format(format!(
                "duplicate player id {player_id} in player keys"
            )));
        }
    }

    if keys.is_empty() {
        return Err(StatsError::EmptyInput {
            path: source.to_path_buf(),
        });
    }
    Ok(keys)
}

pub fn max_match_id(rows: &[MatchRow]) -> Option<u32> {
    rows.iter().map(|row| row.match_id).max()
}

/// Maps each required column to its index. Header order does not matter, but
/// the set must match exactly (blank spreadsheet columns are ignored).
fn column_map(headers: &StringRecord, required: &[String]) -> Result<HashMap<String, usize>> {
    let mut index = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        if index.insert(name.to_string(), idx).is_some() {
            return Err(StatsError::data_format(format!("duplicate column '{name}'")));
        }
    }

    let expected: BTreeSet<&str> = required.iter().map(String::as_str).collect();
    let missing: Vec<&str> = expected
        .iter()
        .copied()
        .filter(|col| !index.contains_key(*col))
        .collect();
    let mut unexpected: Vec<&str> = index
        .keys()
        .map(String::as_str)
        .filter(|col| !expected.contains(col))
        .collect();
    unexpected.sort_unstable();

    if !missing.is_empty() || !unexpected.is_empty() {
        return Err(StatsError::data_format(format!(
            "column headers do not match; missing {missing:?}, unexpected {unexpected:?}"
        )));
    }
    Ok(index)
}

struct RowFields<'a> {
    record: &'a StringRecord,
    columns: &'a HashMap<String, usize>,
}

impl<'a> RowFields<'a> {
    fn get(&self, name: &str) -> Option<&'a str> {
        self.columns.get(name).and_then(|idx| self.record.get(*idx))
    }

    /// A short row lacks trailing cells entirely, unlike a blank slot.
    fn require(&self, name: &str, match_id: u32) -> Result<&'a str> {
        self.get(name)
            .ok_or_else(|| StatsError::bad_row(match_id, format!("missing {name}")))
    }
}

fn parse_match_row(record: &StringRecord, columns: &HashMap<String, usize>) -> Result<MatchRow> {
    let fields = RowFields { record, columns };

    let line = record.position().map(|p| p.line()).unwrap_or_default();
    let raw_id = fields.get(MATCH_ID_COLUMN).unwrap_or_default();
    let match_id = parse_whole_number(raw_id).ok_or_else(|| {
        StatsError::data_format(format!("line {line}: invalid match id '{raw_id}'"))
    })?;

    let row = MatchRow {
        match_id,
        team1: parse_team_sheet(&fields, match_id, TeamSide::One)?,
        team2: parse_team_sheet(&fields, match_id, TeamSide::Two)?,
    };
    check_result_consistency(&row)?;
    check_unique_players(&row)?;
    Ok(row)
}

fn parse_team_sheet(fields: &RowFields<'_>, match_id: u32, side: TeamSide) -> Result<TeamSheet> {
    let mut players = [0u32; SLOTS_PER_TEAM];
    for (slot, player) in players.iter_mut().enumerate() {
        let column = slot_column(side, slot + 1);
        let raw = fields.require(&column, match_id)?;
        if raw.is_empty() {
            continue;
        }
        *player = parse_whole_number(raw).ok_or_else(|| {
            StatsError::bad_row(match_id, format!("invalid player id '{raw}' in {column}"))
        })?;
    }

    let column = goals_column(side);
    let raw = fields.require(&column, match_id)?;
    let goals = parse_whole_number(raw).ok_or_else(|| {
        StatsError::bad_row(
            match_id,
            format!("{column} must be a non-negative integer, got '{raw}'"),
        )
    })?;

    let column = result_column(side);
    let raw = fields.require(&column, match_id)?;
    let result = Outcome::parse(raw).ok_or_else(|| {
        StatsError::bad_row(match_id, format!("invalid result code '{raw}' in {column}"))
    })?;

    Ok(TeamSheet {
        players,
        goals,
        result,
    })
}

fn check_result_consistency(row: &MatchRow) -> Result<()> {
    let (a, b) = (&row.team1, &row.team2);
    let consistent = matches!(
        (a.goals.cmp(&b.goals), a.result, b.result),
        (Ordering::Greater, Outcome::Win, Outcome::Loss)
            | (Ordering::Less, Outcome::Loss, Outcome::Win)
            | (Ordering::Equal, Outcome::Draw, Outcome::Draw)
    );
    if consistent {
        return Ok(());
    }
    Err(StatsError::bad_row(
        row.match_id,
        format!(
            "result codes ({}, {}) do not match score {}-{}",
            a.result.code(),
            b.result.code(),
            a.goals,
            b.goals
        ),
    ))
}

fn check_unique_players(row: &MatchRow) -> Result<()> {
    let mut seen = HashSet::new();
    for side in TeamSide::BOTH {
        for player in row.side(side).present() {
            if !seen.insert(player) {
                return Err(StatsError::bad_row(
                    row.match_id,
                    format!("player {player} listed more than once"),
                ));
            }
        }
    }
    Ok(())
}

/// Accepts "3" and also spreadsheet-style "3.0".
fn parse_whole_number(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<u32>() {
        return Some(value);
    }
    let value = raw.parse::<f64>().ok()?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        Some(value as u32)
    } else {
        None
    }
}
