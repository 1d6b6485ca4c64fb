//! Digest assembly.
//!
//! Produces one [`TopicSection`] per configured topic, in configured order,
//! whatever order the summaries arrive in. Topics without summaries still
//! get an (empty) section so every digest has the same shape.

use crate::models::{Digest, Summary, Topic, TopicSection};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, warn};

pub fn assemble(
    date: NaiveDate,
    topics: &[Topic],
    summarized: Vec<(Topic, Vec<Summary>)>,
) -> Digest {
    let mut by_topic = HashMap::<String, Vec<Summary>>::new();
    for (topic, summaries) in summarized {
        if !topics.iter().any(|t| t.name == topic.name) {
            warn!(
                topic = %topic.name,
                count = summaries.len(),
                "Dropping summaries for unconfigured topic"
            );
            continue;
        }
        by_topic.entry(topic.name).or_default().extend(summaries);
    }

    let sections = topics
        .iter()
        .map(|topic| TopicSection {
            topic: topic.clone(),
            summaries: by_topic.remove(&topic.name).unwrap_or_default(),
        })
        .collect::<Vec<_>>();

    let digest = Digest { date, sections };
    debug!(
        %date,
        sections = digest.sections.len(),
        articles = digest.article_count(),
        "Assembled digest"
    );
    digest
}
