use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::id::{MemberId, PollId};
use crate::{Error, Result};

pub const MIN_POLL_OPTIONS: usize = 2;
pub const MAX_POLL_OPTIONS: usize = 6;
pub const MAX_QUESTION_LEN: usize = 200;
pub const MAX_OPTION_LEN: usize = 100;
pub const MAX_POLL_MINUTES: u32 = 1440;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    #[serde(rename = "id")]
    pub option_id: String,
    pub text: String,
    pub vote_count: u32,
}

/// A room poll. Ballots stay on the server; only tallies are ever sent.
#[derive(Debug, Clone)]
pub struct Poll {
    pub poll_id: PollId,
    pub question: String,
    pub options: Vec<PollOption>,
    pub is_active: bool,
    pub created_by: MemberId,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    votes_by_member: HashMap<MemberId, usize>,
}

impl Poll {
    /// Validate the request and open a new poll with zeroed tallies.
    pub fn new(
        question: &str,
        options: &[String],
        expires_in_minutes: Option<u32>,
        created_by: MemberId,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidPoll("Question is required".to_string()));
        }
        if question.chars().count() > MAX_QUESTION_LEN {
            return Err(Error::InvalidPoll(format!(
                "Question must be at most {MAX_QUESTION_LEN} characters"
            )));
        }
        if !(MIN_POLL_OPTIONS..=MAX_POLL_OPTIONS).contains(&options.len()) {
            return Err(Error::InvalidPoll(format!(
                "A poll needs {MIN_POLL_OPTIONS}-{MAX_POLL_OPTIONS} options"
            )));
        }

        let mut parsed = Vec::with_capacity(options.len());
        for (index, text) in options.iter().enumerate() {
            let text = text.trim();
            if text.is_empty() {
                return Err(Error::InvalidPoll("Options cannot be empty".to_string()));
            }
            if text.chars().count() > MAX_OPTION_LEN {
                return Err(Error::InvalidPoll(format!(
                    "Options must be at most {MAX_OPTION_LEN} characters"
                )));
            }
            parsed.push(PollOption {
                option_id: format!("opt{index}"),
                text: text.to_string(),
                vote_count: 0,
            });
        }

        let expires_at = match expires_in_minutes {
            None => None,
            Some(minutes) if (1..=MAX_POLL_MINUTES).contains(&minutes) => {
                Some(now + Duration::minutes(i64::from(minutes)))
            }
            Some(_) => {
                return Err(Error::InvalidPoll(format!(
                    "Expiry must be 1-{MAX_POLL_MINUTES} minutes"
                )))
            }
        };

        Ok(Self {
            poll_id: PollId::new(),
            question: question.to_string(),
            options: parsed,
            is_active: true,
            created_by,
            created_at: now,
            expires_at,
            votes_by_member: HashMap::new(),
        })
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Close the poll. Returns true only on the transition.
    pub fn close(&mut self) -> bool {
        std::mem::replace(&mut self.is_active, false)
    }

    /// Record or move `member`'s ballot.
    pub fn vote(&mut self, member: &MemberId, option_id: &str) -> Result<()> {
        if !self.is_active {
            return Err(Error::PollClosed);
        }
        let new_index = self
            .options
            .iter()
            .position(|o| o.option_id == option_id)
            .ok_or_else(|| Error::InvalidOption(option_id.to_string()))?;

        match self.votes_by_member.insert(member.clone(), new_index) {
            Some(previous) if previous == new_index => {}
            Some(previous) => {
                self.options[previous].vote_count = self.options[previous].vote_count.saturating_sub(1);
                self.options[new_index].vote_count += 1;
            }
            None => self.options[new_index].vote_count += 1,
        }
        Ok(())
    }

    /// Move a ballot to the member entry that replaced `from` on reconnect.
    pub fn transfer_ballot(&mut self, from: &MemberId, to: &MemberId) {
        if let Some(choice) = self.votes_by_member.remove(from) {
            self.votes_by_member.insert(to.clone(), choice);
        }
    }

    #[must_use]
    pub fn total_votes(&self) -> usize {
        self.votes_by_member.len()
    }

    #[must_use]
    pub fn view(&self) -> PollView {
        PollView {
            poll_id: self.poll_id.clone(),
            question: self.question.clone(),
            options: self.options.clone(),
            is_active: self.is_active,
            created_at: self.created_at,
            expires_at: self.expires_at,
            total_votes: self.total_votes(),
        }
    }
}

/// Public projection of a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollView {
    #[serde(rename = "id")]
    pub poll_id: PollId,
    pub question: String,
    pub options: Vec<PollOption>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub total_votes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    fn sum_counts(poll: &Poll) -> usize {
        poll.options.iter().map(|o| o.vote_count as usize).sum()
    }

    #[test]
    fn test_validation() {
        let host = MemberId::new();
        let now = Utc::now();
        assert!(matches!(
            Poll::new("", &options(&["A", "B"]), None, host.clone(), now),
            Err(Error::InvalidPoll(_))
        ));
        assert!(Poll::new("Q?", &options(&["A"]), None, host.clone(), now).is_err());
        assert!(Poll::new("Q?", &options(&["1", "2", "3", "4", "5", "6", "7"]), None, host.clone(), now).is_err());
        assert!(Poll::new("Q?", &options(&["A", " "]), None, host.clone(), now).is_err());
        assert!(Poll::new("Q?", &options(&["A", "B"]), Some(0), host.clone(), now).is_err());

        let poll = Poll::new(" Next? ", &options(&["A", "B"]), Some(5), host, now).unwrap();
        assert_eq!(poll.question, "Next?");
        assert_eq!(poll.options[1].option_id, "opt1");
        assert_eq!(poll.expires_at, Some(now + Duration::minutes(5)));
    }

    #[test]
    fn test_revote_moves_ballot() {
        let mut poll = Poll::new("Q?", &options(&["A", "B"]), None, MemberId::new(), Utc::now()).unwrap();
        let bob = MemberId::new();

        poll.vote(&bob, "opt0").unwrap();
        assert_eq!(poll.options[0].vote_count, 1);

        poll.vote(&bob, "opt1").unwrap();
        assert_eq!(poll.options[0].vote_count, 0);
        assert_eq!(poll.options[1].vote_count, 1);

        poll.vote(&bob, "opt1").unwrap();
        assert_eq!(poll.options[1].vote_count, 1);
        assert_eq!(sum_counts(&poll), poll.total_votes());
    }

    #[test]
    fn test_vote_conservation_across_members() {
        let mut poll =
            Poll::new("Q?", &options(&["A", "B", "C"]), None, MemberId::new(), Utc::now()).unwrap();
        let members: Vec<MemberId> = (0..5).map(|_| MemberId::new()).collect();

        for (i, m) in members.iter().enumerate() {
            poll.vote(m, &format!("opt{}", i % 3)).unwrap();
            assert_eq!(sum_counts(&poll), poll.total_votes());
        }
        for m in &members {
            poll.vote(m, "opt2").unwrap();
            assert_eq!(sum_counts(&poll), poll.total_votes());
        }
        assert_eq!(poll.options[2].vote_count, 5);
    }

    #[test]
    fn test_closed_poll_rejects_votes() {
        let mut poll = Poll::new("Q?", &options(&["A", "B"]), None, MemberId::new(), Utc::now()).unwrap();
        assert!(poll.close());
        assert!(!poll.close());
        assert!(matches!(poll.vote(&MemberId::new(), "opt0"), Err(Error::PollClosed)));
    }

    #[test]
    fn test_unknown_option() {
        let mut poll = Poll::new("Q?", &options(&["A", "B"]), None, MemberId::new(), Utc::now()).unwrap();
        assert!(matches!(
            poll.vote(&MemberId::new(), "opt9"),
            Err(Error::InvalidOption(_))
        ));
        assert_eq!(poll.total_votes(), 0);
    }

    #[test]
    fn test_transfer_ballot() {
        let mut poll = Poll::new("Q?", &options(&["A", "B"]), None, MemberId::new(), Utc::now()).unwrap();
        let old = MemberId::new();
        let new = MemberId::new();
        poll.vote(&old, "opt0").unwrap();
        poll.transfer_ballot(&old, &new);

        poll.vote(&new, "opt1").unwrap();
        assert_eq!(poll.options[0].vote_count, 0);
        assert_eq!(poll.options[1].vote_count, 1);
        assert_eq!(poll.total_votes(), 1);
    }

    #[test]
    fn test_view_never_contains_ballots() {
        let mut poll = Poll::new("Q?", &options(&["A", "B"]), None, MemberId::new(), Utc::now()).unwrap();
        let voter = MemberId::from("voter-xyz");
        poll.vote(&voter, "opt0").unwrap();

        let json = serde_json::to_value(poll.view()).unwrap();
        assert_eq!(json["totalVotes"], 1);
        assert_eq!(json["options"][0]["voteCount"], 1);
        assert!(!json.to_string().contains("voter-xyz"));
    }
}
