//! Built-in routing table.

use doctrine_types::Domain;

/// Default pattern list for a domain. `General` and `Unknown` have none.
pub fn default_patterns(domain: Domain) -> &'static [&'static str] {
    match domain {
        Domain::Doctrine => &[
            r"\bdoctrine\b",
            r"\bdefin(e|es|ed|ition|itions)\b",
            r"\bprimitives?\b",
            r"\bcanonical\b",
            r"\bterminology\b",
        ],
        Domain::RiskManagement => &[
            r"\brisk\b",
            r"\bstop[- ]?loss(es)?\b",
            r"\bposition siz(e|es|ing)\b",
            r"\bdrawdowns?\b",
            r"\bexposure\b",
            r"\bleverage\b",
        ],
        Domain::Execution => &[
            r"\bentr(y|ies)\b",
            r"\bexits?\b",
            r"\b(limit|market|stop) orders?\b",
            r"\bfill(s|ed)?\b",
            r"\bslippage\b",
            r"\btake[- ]?profit\b",
        ],
        Domain::MarketStructure => &[
            r"\bmarket structure\b",
            r"\btrend(s|ing)?\b",
            r"\bregimes?\b",
            r"\bliquidity\b",
            r"\b(support|resistance)\b",
            r"\bbreak of structure\b",
        ],
        Domain::Process => &[
            r"\bjournal(s|ing)?\b",
            r"\broutines?\b",
            r"\bchecklists?\b",
            r"\b(weekly|daily) review\b",
            r"\bprocess\b",
        ],
        Domain::Hybrid => &[
            r"\bbrainstorm\w*",
            r"\bwhat if\b",
            r"\bthoughts on\b",
            r"\bperspectives?\b",
            r"\bcompare\b",
        ],
        Domain::Reflective => &[
            r"\bi feel\b",
            r"\bfeeling\b",
            r"\bfrustrat\w*",
            r"\banx(ious|iety)\b",
            r"\b(fear|afraid|scared)\b",
            r"\btilt(ed)?\b",
            r"\bburn(ed|t)? out\b",
            r"\bmotivat\w*",
        ],
        Domain::General | Domain::Unknown => &[],
    }
}
