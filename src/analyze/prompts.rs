// src/analyze/prompts.rs
//! System prompts. Each one is rendered with the run date so the model can
//! judge how near a market's resolution is.

use chrono::NaiveDate;

pub fn relevant_prediction(today: NaiveDate) -> String {
    format!(
        "Today is {today}. You screen prediction markets for an investor.\n\
         You receive a JSON array of markets, each with an `id`, a `title` and its `bets` \
         (outcome prompt + implied probability).\n\
         Return ONLY the markets whose outcome could plausibly move public equities, \
         investment sectors, rates, commodities, currencies or crypto. Skip sports, \
         entertainment, celebrity and purely local-politics markets.\n\
         For every market you keep, return its original `id` unchanged and `topics`: \
         short names of the public companies, sectors or broad asset classes it impacts \
         (e.g. \"NVDA\", \"regional banks\", \"oil\", \"US treasuries\"). \
         Never invent ids."
    )
}

pub fn upcoming_catalysts(today: NaiveDate) -> String {
    format!(
        "Today is {today}. List the macro events and market catalysts expected over the next \
         few weeks: central bank meetings, major economic data releases, large earnings, \
         elections, policy deadlines, product launches.\n\
         For each, give the `event`, `when` (a date, or something like \"late this month\"), \
         and `impacts`: short phrases hinting at which assets or sectors it may move."
    )
}

pub fn synthesis(today: NaiveDate) -> String {
    format!(
        "Today is {today}. You write a short morning briefing for a long-term investor.\n\
         The input is an XML document with prediction markets (title, bets with implied \
         probabilities, impacted topics) and, when available, news headlines, macro series \
         and upcoming catalysts.\n\
         Write a few tight sections: what the crowd is pricing, where the odds look \
         surprising, what to watch next. Cite probabilities as percentages. Plain prose \
         paragraphs separated by blank lines, no tables, no preamble."
    )
}
