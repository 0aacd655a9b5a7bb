use storage::models::{DiscardRule, PenaltyRule, PointTable};

use super::models::LegacyFile;
use crate::formats::csv::always_quote;

/// Writes the legacy line format: `"key","value","competitor","race"` per line.
#[derive(Default)]
pub struct LegacyWriter {
    lines: Vec<String>,
}

fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

pub(crate) fn penalty_value(rule: &PenaltyRule) -> String {
    match rule {
        PenaltyRule::EntriesInRacePlusOne => "race".to_string(),
        PenaltyRule::EntriesInSeriesPlusOne => "series".to_string(),
        PenaltyRule::Fixed { points } => format!("fixed:{}", points),
    }
}

fn table_values(table: &PointTable) -> (String, String) {
    let points: Vec<String> = table.points.iter().map(f64::to_string).collect();
    (
        points.join(";"),
        format!("{};{}", table.beyond_multiplier, table.beyond_offset),
    )
}

impl LegacyWriter {
    pub fn write(file: &LegacyFile) -> String {
        let mut writer = Self::default();
        writer.write_series(file);
        writer.write_competitors(file);
        writer.write_races(file);
        writer.write_results(file);

        let mut out = writer.lines.join("\n");
        out.push('\n');
        out
    }

    fn line(&mut self, key: &str, value: &str, competitor: Option<u32>, race: Option<u32>) {
        let number = |n: Option<u32>| n.map(|n| n.to_string()).unwrap_or_default();
        self.lines.push(format!(
            "{},{},{},{}",
            always_quote(key),
            always_quote(value),
            always_quote(&number(competitor)),
            always_quote(&number(race)),
        ));
    }

    fn series(&mut self, key: &str, value: &str) {
        self.line(key, value, None, None);
    }

    fn write_series(&mut self, file: &LegacyFile) {
        let event = &file.event;
        self.series("serevent", &event.name);
        self.series("serslug", &event.slug);
        if let Some(venue) = &event.venue {
            self.series("servenue", venue);
        }
        if let Some(start) = event.start_date {
            self.series("serstart", &start.to_string());
        }
        if let Some(end) = event.end_date {
            self.series("serend", &end.to_string());
        }
        if let Some(division) = &event.division {
            self.series("serdivision", division);
        }

        let config = &file.config;
        self.series("sersystem", config.system.as_str());

        match &config.discard_rule {
            DiscardRule::None => self.series("serdiscardtype", "none"),
            DiscardRule::WorstN {
                count,
                min_races_for_discard,
            } => {
                self.series("serdiscardtype", "worst_n");
                self.series("serdiscardcount", &count.to_string());
                if let Some(min) = min_races_for_discard {
                    self.series("serdiscardmin", &min.to_string());
                }
            }
            DiscardRule::Percentage {
                pct,
                min_races_for_discard,
            } => {
                self.series("serdiscardtype", "percentage");
                self.series("serdiscardpct", &pct.to_string());
                if let Some(min) = min_races_for_discard {
                    self.series("serdiscardmin", &min.to_string());
                }
            }
        }

        self.series("sercorrected", flag(config.use_corrected_time));
        self.series("serexcludedns", flag(config.exclude_dns_dnc_from_discard));
        if let Some(points) = config.first_place_points {
            self.series("serfirstpoints", &points.to_string());
        }

        let rules: Vec<&str> = config.tie_breaking_rules.iter().map(|r| r.as_str()).collect();
        self.series("sertiebreak", &rules.join(";"));

        self.series(
            "sermissing",
            config.missing_result_policy.map_or("", |policy| policy.as_str()),
        );

        for (code, rule) in &config.code_penalties {
            self.series("serpenalty", &format!("{}={}", code, penalty_value(rule)));
        }

        let (points, beyond) = table_values(&config.bonus_table);
        self.series("sertable", &points);
        self.series("sertablebeyond", &beyond);

        if let Some(formula) = &config.custom_formula {
            let (points, beyond) = table_values(&formula.table);
            self.series("sercustomtable", &points);
            self.series("sercustombeyond", &beyond);
            self.series("sercustomhigh", flag(formula.higher_is_better));
        }
    }

    fn write_competitors(&mut self, file: &LegacyFile) {
        for competitor in &file.competitors {
            let n = Some(competitor.number);
            let entry = &competitor.entry;

            self.line("compentryid", &entry.entry_id.to_string(), n, None);
            if let Some(user_id) = entry.user_id {
                self.line("compuserid", &user_id.to_string(), n, None);
            }
            self.line("compname", &entry.name, n, None);
            self.line("compsailno", &entry.sail_number, n, None);
            self.line("compclass", &entry.boat_class, n, None);
            if let Some(division) = &entry.division {
                self.line("compdivision", division, n, None);
            }
            if let Some(club) = &entry.club {
                self.line("compclub", club, n, None);
            }

            let recorded = &competitor.recorded;
            if let Some(rank) = recorded.rank {
                self.line("comprank", &rank.to_string(), n, None);
            }
            if let Some(total) = recorded.total {
                self.line("comptotal", &total.to_string(), n, None);
            }
            if let Some(net) = recorded.net {
                self.line("compnett", &net.to_string(), n, None);
            }
            self.line("comptied", flag(recorded.tied), n, None);
            if let Some(explanation) = &recorded.tie_breaker {
                self.line("comptiebreak", explanation, n, None);
            }
        }
    }

    fn write_races(&mut self, file: &LegacyFile) {
        for race in &file.races {
            let r = Some(race.number);
            self.line("raceid", &race.race.race_id.to_string(), None, r);
            self.line("raceseq", &race.race.sequence.to_string(), None, r);
            if let Some(name) = &race.race.name {
                self.line("racename", name, None, r);
            }
        }
    }

    fn write_results(&mut self, file: &LegacyFile) {
        for result in &file.results {
            let (c, r) = (Some(result.competitor), Some(result.race));

            match result.outcome.and_then(|o| o.position()) {
                Some(position) => self.line("rpos", &position.to_string(), c, r),
                None => {
                    if let Some(code) = result.outcome.and_then(|o| o.code()) {
                        self.line("rcod", code.as_str(), c, r);
                    }
                }
            }
            if let Some(elapsed) = result.elapsed_time {
                self.line("rela", &elapsed.to_string(), c, r);
            }
            if let Some(corrected) = result.corrected_time {
                self.line("rcor", &corrected.to_string(), c, r);
            }
            if let Some(revision) = result.revision {
                self.line("rrev", &revision.to_string(), c, r);
            }
            if let Some(points) = result.points {
                self.line("rpts", &points.to_string(), c, r);
            }
            if let Some(place) = result.place {
                self.line("rplace", &place.to_string(), c, r);
            }
            if result.discarded {
                self.line("rdisc", "1", c, r);
            }
        }
    }
}
