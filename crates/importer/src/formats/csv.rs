use std::collections::BTreeSet;

use storage::models::{FinishOutcome, RaceScore, SeriesStanding};

/// Quotes a field when it contains a comma, quote or line break.
pub fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        always_quote(field)
    } else {
        field.to_string()
    }
}

pub fn always_quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Splits one CSV line into fields, honouring quotes and `""` escapes.
pub fn split_line(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;
    let mut was_quoted = false;

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() && !was_quoted => {
                in_quotes = true;
                was_quoted = true;
            }
            ('"', false) => return Err(format!("Unexpected quote after '{}'", field)),
            (',', false) => {
                fields.push(std::mem::take(&mut field));
                was_quoted = false;
            }
            (c, _) if !in_quotes && was_quoted && !c.is_whitespace() => {
                return Err(format!("Unexpected character '{}' after closing quote", c));
            }
            (c, _) if !in_quotes && was_quoted => {}
            (c, _) => field.push(c),
        }
    }

    if in_quotes {
        return Err("Unterminated quoted field".to_string());
    }

    fields.push(field);
    Ok(fields)
}

/// Shortest readable form: `3`, `1.5`, `5.7`.
pub fn format_points(points: f64) -> String {
    if points.fract() == 0.0 && points.abs() < 1e15 {
        format!("{}", points as i64)
    } else {
        let rounded = format!("{:.6}", points);
        rounded.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn race_cell(score: Option<&RaceScore>) -> String {
    let Some(score) = score else {
        return String::new();
    };

    if score.discarded {
        return format!("({})", format_points(score.points));
    }

    match score.outcome {
        FinishOutcome::Code(code) => code.to_string(),
        FinishOutcome::Position(_) => format_points(score.points),
    }
}

/// Renders standings as CSV: `Rank,SailNumber,Name,Club,TotalPoints,NetPoints,R1..Rn`.
///
/// Race columns are numbered by position in sequence order, so a gap in race
/// sequences does not leave a gap in the header.
pub fn export_csv(standings: &[SeriesStanding]) -> String {
    let sequences: BTreeSet<u32> = standings
        .iter()
        .flat_map(|s| s.race_scores.iter().map(|r| r.race_sequence))
        .collect();

    let mut header = vec![
        "Rank".to_string(),
        "SailNumber".to_string(),
        "Name".to_string(),
        "Club".to_string(),
        "TotalPoints".to_string(),
        "NetPoints".to_string(),
    ];
    header.extend((1..=sequences.len()).map(|column| format!("R{}", column)));

    let mut out = header.join(",");
    out.push('\n');

    for standing in standings {
        let mut row = vec![
            standing.rank.to_string(),
            quote_field(&standing.entry.sail_number),
            quote_field(&standing.entry.name),
            quote_field(standing.entry.club.as_deref().unwrap_or("")),
            format_points(standing.total_points),
            format_points(standing.net_points),
        ];

        row.extend(sequences.iter().map(|seq| {
            let score = standing.race_scores.iter().find(|r| r.race_sequence == *seq);
            quote_field(&race_cell(score))
        }));

        out.push_str(&row.join(","));
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::models::{Entry, ScoringCode};
    use uuid::Uuid;

    fn score(sequence: u32, outcome: FinishOutcome, points: f64, discarded: bool) -> RaceScore {
        RaceScore {
            race_id: Uuid::new_v4(),
            race_sequence: sequence,
            outcome,
            position: outcome.position(),
            points,
            discarded,
        }
    }

    fn standing(entry: Entry, rank: u32, race_scores: Vec<RaceScore>) -> SeriesStanding {
        let total: f64 = race_scores.iter().map(|r| r.points).sum();
        let net: f64 = race_scores.iter().filter(|r| !r.discarded).map(|r| r.points).sum();
        SeriesStanding {
            regatta_id: Uuid::new_v4(),
            division: None,
            entry,
            rank,
            races_sailed: race_scores.len() as u32,
            discards_used: race_scores.iter().filter(|r| r.discarded).count() as u32,
            race_scores,
            total_points: total,
            net_points: net,
            wins: 0,
            podiums: 0,
            best_finish: None,
            worst_finish: None,
            tied: false,
            tie_breaker: None,
        }
    }

    #[test]
    fn test_export_marks_discards_and_codes() {
        let mut entry = Entry::new(Uuid::new_v4(), "Smith, Jo", "GBR 42");
        entry.club = Some("RYC".to_string());

        let csv = export_csv(&[standing(
            entry,
            1,
            vec![
                score(1, FinishOutcome::Position(1), 1.0, false),
                score(2, FinishOutcome::Code(ScoringCode::Dnf), 11.0, true),
                score(3, FinishOutcome::Code(ScoringCode::Ocs), 11.0, false),
                score(4, FinishOutcome::Position(2), 1.5, false),
            ],
        )]);

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Rank,SailNumber,Name,Club,TotalPoints,NetPoints,R1,R2,R3,R4");
        assert_eq!(lines[1], "1,GBR 42,\"Smith, Jo\",RYC,24.5,13.5,1,(11),OCS,1.5");
    }

    #[test]
    fn test_missing_race_leaves_empty_cell() {
        let a = standing(
            Entry::new(Uuid::new_v4(), "A", "1"),
            1,
            vec![
                score(1, FinishOutcome::Position(1), 1.0, false),
                score(2, FinishOutcome::Position(1), 1.0, false),
            ],
        );
        let b = standing(
            Entry::new(Uuid::new_v4(), "B", "2"),
            2,
            vec![score(1, FinishOutcome::Position(2), 2.0, false)],
        );

        let csv = export_csv(&[a, b]);
        assert_eq!(csv.lines().nth(2), Some("2,2,B,,2,2,2,"));
    }

    #[test]
    fn test_race_columns_are_positional() {
        let csv = export_csv(&[standing(
            Entry::new(Uuid::new_v4(), "A", "1"),
            1,
            vec![
                score(1, FinishOutcome::Position(1), 1.0, false),
                score(2, FinishOutcome::Position(2), 2.0, false),
                score(5, FinishOutcome::Position(3), 3.0, false),
            ],
        )]);

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Rank,SailNumber,Name,Club,TotalPoints,NetPoints,R1,R2,R3");
        assert_eq!(lines[1], "1,1,A,,6,6,1,2,3");
    }

    #[test]
    fn test_split_line_handles_escaped_quotes() {
        let fields = split_line(r#""compname","O""Brien, Pat","3","""#).unwrap();
        assert_eq!(fields, vec!["compname", "O\"Brien, Pat", "3", ""]);

        assert_eq!(split_line("a,,b").unwrap(), vec!["a", "", "b"]);
        assert!(split_line(r#""open"#).is_err());
    }

    #[test]
    fn test_format_points() {
        assert_eq!(format_points(3.0), "3");
        assert_eq!(format_points(5.7), "5.7");
        assert_eq!(format_points(1.0 / 3.0), "0.333333");
    }
}
