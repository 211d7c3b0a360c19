//! Long/flat position series produced by the signal generator.

use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Position {
    #[default]
    Flat,
    Long,
}

impl Position {
    /// 0.0 when flat, 1.0 when fully invested.
    pub fn weight(&self) -> f64 {
        match self {
            Position::Flat => 0.0,
            Position::Long => 1.0,
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self, Position::Long)
    }
}

impl From<bool> for Position {
    fn from(long: bool) -> Self {
        if long { Position::Long } else { Position::Flat }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionPoint {
    pub timestamp: NaiveDateTime,
    pub position: Position,
}

/// Aligned 1:1 with the price series it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSeries {
    pub points: Vec<PositionPoint>,
}

impl PositionSeries {
    pub fn new(timestamps: &[NaiveDateTime], positions: Vec<Position>) -> Self {
        let points = timestamps
            .iter()
            .zip(positions)
            .map(|(&timestamp, position)| PositionPoint {
                timestamp,
                position,
            })
            .collect();
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Position> {
        self.points.get(index).map(|p| p.position)
    }

    pub fn positions(&self) -> Vec<Position> {
        self.points.iter().map(|p| p.position).collect()
    }

    /// Bars where the position changes, as (timestamp, new position).
    pub fn transitions(&self) -> Vec<PositionPoint> {
        let mut prev = Position::Flat;
        let mut out = Vec::new();
        for point in &self.points {
            if point.position != prev {
                out.push(*point);
                prev = point.position;
            }
        }
        out
    }
}
