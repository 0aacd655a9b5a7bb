//! Legacy line-based interchange format (`.blw`).

pub mod models;
pub mod reader;
pub mod transformer;
pub mod validator;
pub mod writer;

pub use models::{LegacyCompetitor, LegacyEvent, LegacyFile, LegacyRace, LegacyResult, RecordedTotals};
pub use reader::LegacyReader;
pub use transformer::LegacyTransformer;
pub use validator::{LegacyValidator, ValidationReport};
pub use writer::LegacyWriter;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ImporterError;
    use storage::models::{
        DiscardRule, Entry, FinishOutcome, PenaltyRule, Race, RaceResult, ScoringCode,
        ScoringConfiguration, ScoringSystem,
    };
    use storage::services::scoring::{SeriesInput, compute_series_standings};
    use uuid::Uuid;

    fn series() -> SeriesInput {
        let regatta_id = Uuid::new_v4();
        let mut entries = vec![
            Entry::new(Uuid::new_v4(), "Alpha", "GBR 1"),
            Entry::new(Uuid::new_v4(), "O'Brien, Pat", "IRL 7"),
            Entry::new(Uuid::new_v4(), "Charlie \"C\"", "FRA 3"),
        ];
        entries[0].club = Some("RYC".to_string());
        entries[1].user_id = Some(Uuid::new_v4());

        let races: Vec<Race> = (1..=4).map(|seq| Race::new(Uuid::new_v4(), seq)).collect();

        let finishes = [
            [FinishOutcome::Position(1), FinishOutcome::Position(2), FinishOutcome::Position(3)],
            [FinishOutcome::Position(2), FinishOutcome::Position(1), FinishOutcome::Code(ScoringCode::Dsq)],
            [FinishOutcome::Code(ScoringCode::Dnf), FinishOutcome::Position(1), FinishOutcome::Position(2)],
            [FinishOutcome::Position(1), FinishOutcome::Position(3), FinishOutcome::Position(2)],
        ];

        let mut results = Vec::new();
        for (race, outcomes) in races.iter().zip(finishes) {
            for (entry, outcome) in entries.iter().zip(outcomes) {
                results.push(RaceResult::new(race.race_id, entry.entry_id, outcome));
            }
        }
        // correction supersedes the original finish
        results.push(
            RaceResult::new(races[3].race_id, entries[1].entry_id, FinishOutcome::Position(2))
                .with_revision(2),
        );
        results.push(
            RaceResult::new(races[3].race_id, entries[2].entry_id, FinishOutcome::Position(3))
                .with_revision(2),
        );

        let mut config = ScoringConfiguration {
            discard_rule: DiscardRule::WorstN {
                count: 1,
                min_races_for_discard: Some(4),
            },
            first_place_points: Some(0.75),
            ..Default::default()
        };
        config
            .code_penalties
            .insert(ScoringCode::Dsq, PenaltyRule::Fixed { points: 20.0 });

        SeriesInput {
            regatta_id,
            division: None,
            entries,
            races,
            results,
            config: Some(config),
            load_errors: Vec::new(),
        }
    }

    fn event() -> LegacyEvent {
        LegacyEvent {
            name: "Autumn Series".to_string(),
            slug: "autumn-series".to_string(),
            venue: Some("Cowes".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_export_then_import_reproduces_standings() {
        let input = series();
        let original = compute_series_standings(&input).unwrap();
        assert!(!original.report.has_errors());

        let file = LegacyFile::from_series(event(), &input, &original.standings);
        let text = LegacyWriter::write(&file);

        let parsed = LegacyReader::parse(&text).unwrap();
        assert_eq!(parsed.event, file.event);
        assert_eq!(parsed.config, file.config);
        assert_eq!(parsed.competitors.len(), 3);

        let report = LegacyValidator::validate(&parsed).unwrap();
        assert!(report.errors.is_empty());

        let recomputed = compute_series_standings(&parsed.to_series_input(input.regatta_id)).unwrap();
        assert_eq!(recomputed.standings.len(), original.standings.len());

        for before in &original.standings {
            let after = recomputed
                .standings
                .iter()
                .find(|s| s.entry.entry_id == before.entry.entry_id)
                .unwrap();
            assert_eq!(after.entry, before.entry);
            assert_eq!(after.rank, before.rank);
            assert_eq!(after.tied, before.tied);
            assert!((after.net_points - before.net_points).abs() < 1e-6);
            assert!((after.total_points - before.total_points).abs() < 1e-6);
        }
    }

    #[test]
    fn test_export_keeps_only_effective_results() {
        let input = series();
        let computed = compute_series_standings(&input).unwrap();
        let file = LegacyFile::from_series(event(), &input, &computed.standings);

        // 3 entries x 4 races, corrections replace rather than add
        assert_eq!(file.results.len(), 12);
        assert!(file.results.iter().all(|r| r.points.is_some()));
        assert_eq!(file.results.iter().filter(|r| r.discarded).count(), 3);

        let corrected = file
            .results
            .iter()
            .find(|r| r.revision == Some(2) && r.outcome == Some(FinishOutcome::Position(3)))
            .unwrap();
        assert_eq!(corrected.race, 4);
    }

    #[test]
    fn test_writer_quotes_every_field() {
        let input = series();
        let computed = compute_series_standings(&input).unwrap();
        let text = LegacyWriter::write(&LegacyFile::from_series(event(), &input, &computed.standings));

        assert!(text.starts_with("\"serevent\",\"Autumn Series\",\"\",\"\"\n"));
        assert!(text.contains("\"serpenalty\",\"DSQ=fixed:20\",\"\",\"\""));
        assert!(text.contains("\"serdiscardtype\",\"worst_n\",\"\",\"\""));
        assert!(text.contains("\"compname\",\"Charlie \"\"C\"\"\","));
    }

    #[test]
    fn test_parse_reads_configuration_keys() {
        let text = r#"
"serevent","Club Night","",""
"serslug","club-night","",""
"sersystem","high_point","",""
"serdiscardtype","percentage","",""
"serdiscardpct","25","",""
"serpenalty","DNF=race","",""
"serpenalty","DNS=fixed:9.5","",""
"sermissing","exclude","",""
"sertiebreak","most_firsts","",""
"serunknown","ignored","",""
"compsailno","101","1",""
"compname","Solo","1",""
"raceseq","1","","1"
"rpos","1","1","1"
"#;
        let file = LegacyReader::parse(text).unwrap();

        assert_eq!(file.config.system, ScoringSystem::HighPoint);
        assert_eq!(
            file.config.discard_rule,
            DiscardRule::Percentage {
                pct: 25.0,
                min_races_for_discard: None
            }
        );
        assert_eq!(
            file.config.code_penalties.get(&ScoringCode::Dns),
            Some(&PenaltyRule::Fixed { points: 9.5 })
        );
        assert_eq!(
            file.config.code_penalties.get(&ScoringCode::Dnf),
            Some(&PenaltyRule::EntriesInRacePlusOne)
        );
        assert_eq!(file.config.tie_breaking_rules.len(), 1);
        assert_eq!(file.competitors[0].entry.sail_number, "101");
        assert_eq!(file.results[0].outcome, Some(FinishOutcome::Position(1)));
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        let short = "\"serevent\",\"x\"\n";
        assert!(matches!(
            LegacyReader::parse(short),
            Err(ImporterError::ParseError { line: 1, .. })
        ));

        let bad_number = "\"serevent\",\"x\",\"\",\"\"\n\"rpos\",\"1\",\"one\",\"1\"\n";
        assert!(matches!(
            LegacyReader::parse(bad_number),
            Err(ImporterError::ParseError { line: 2, .. })
        ));

        let both = "\"rpos\",\"2\",\"1\",\"1\"\n\"rcod\",\"DNF\",\"1\",\"1\"\n";
        assert!(matches!(
            LegacyReader::parse(both),
            Err(ImporterError::ParseError { line: 2, .. })
        ));

        let zero = "\"rpos\",\"0\",\"1\",\"1\"\n";
        assert!(LegacyReader::parse(zero).is_err());

        let no_count = "\"serdiscardtype\",\"worst_n\",\"\",\"\"\n";
        assert!(matches!(
            LegacyReader::parse(no_count),
            Err(ImporterError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validator_reports_dangling_references() {
        let text = r#"
"serevent","Club Night","",""
"serslug","club-night","",""
"compsailno","101","1",""
"compsailno","101","2",""
"raceseq","1","","1"
"rpos","1","1","1"
"rpos","1","3","1"
"rela","3600","2","1"
"#;
        let file = LegacyReader::parse(text).unwrap();
        let err = LegacyValidator::validate(&file).unwrap_err();

        let message = err.to_string();
        assert!(message.contains("2 error(s)"));
        assert!(message.contains("competitor 3 race 1 references an unknown competitor"));
        assert!(message.contains("competitor 2 race 1 has neither a position nor a code"));
    }

    #[test]
    fn test_validator_warnings() {
        let text = r#"
"serevent","Club Night","",""
"serslug","club-night","",""
"compsailno","101","1",""
"compsailno","101","2",""
"raceseq","1","","1"
"rpos","1","1","1"
"#;
        let file = LegacyReader::parse(text).unwrap();
        let report = LegacyValidator::validate(&file).unwrap();

        assert!(report.warnings.iter().any(|w| w.contains("Sail number '101'")));
        assert!(report.warnings.iter().any(|w| w.contains("Competitor 2 (101) has no results")));
        assert!(report.warnings.iter().any(|w| w.contains("venue")));
    }
}
