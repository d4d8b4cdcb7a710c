//! Per-domain assistant profiles.
//!
//! A profile carries everything domain-specific that is not a tool: the
//! persona and routing rules written into the prompt, worked examples, the
//! pre-filter keywords, and the fixed decline message.

use std::fmt;

/// The query domains this service answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Weather,
    Students,
}

impl Domain {
    pub fn profile(self) -> DomainProfile {
        match self {
            Domain::Weather => DomainProfile::weather(),
            Domain::Students => DomainProfile::students(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Weather => "weather",
            Domain::Students => "students",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A worked example shown to the model: user query and the expected JSON reply.
#[derive(Debug, Clone, Copy)]
pub struct PromptExample {
    pub query: &'static str,
    pub reply: &'static str,
}

#[derive(Debug, Clone)]
pub struct DomainProfile {
    pub domain: Domain,
    /// Opening line of every prompt.
    pub persona: &'static str,
    /// Tool-selection guidance, one rule per entry.
    pub rules: &'static [&'static str],
    pub examples: &'static [PromptExample],
    /// Lower-case substrings that mark a prompt as plausibly in-domain.
    pub keywords: &'static [&'static str],
    /// Returned verbatim when the pre-filter rejects a prompt.
    pub decline_message: &'static str,
}

impl DomainProfile {
    pub fn weather() -> Self {
        Self {
            domain: Domain::Weather,
            persona: "You are an intelligent weather assistant for Indian cities (Kolkata, Howrah, Mumbai, Bangalore, Delhi).",
            rules: &[
                "A specific city (including old names such as Calcutta, Bombay or Bengaluru) means fetchWeatherByCity.",
                "Pollution, air quality, AQI or smog questions mean getCitiesByAQI; use threshold 100 unless the user gives one.",
                "Hot, cold or temperature comparisons across cities mean getCitiesByTemperatureRange.",
                "Never invent a city: if the user names a city you do not know, call the tool and report what it returns.",
                "Questions about code, maths or anything else unrelated to weather get needsMoreTools false and a polite decline.",
            ],
            examples: &[
                PromptExample {
                    query: "Weather in Mumbai",
                    reply: r#"{"needsMoreTools": true, "toolCalls": [{"tool": "fetchWeatherByCity", "parameters": {"city": "mumbai"}, "reasoning": "User asked about one city"}]}"#,
                },
                PromptExample {
                    query: "Which cities have bad air quality?",
                    reply: r#"{"needsMoreTools": true, "toolCalls": [{"tool": "getCitiesByAQI", "parameters": {"threshold": 100, "isHigher": true}, "reasoning": "Poor air means AQI above 100"}]}"#,
                },
                PromptExample {
                    query: "What is 2+2?",
                    reply: r#"{"needsMoreTools": false, "finalResponse": "I can only help with weather questions for Kolkata, Howrah, Mumbai, Bangalore and Delhi."}"#,
                },
            ],
            keywords: &[
                "weather", "temperature", "temp", "hot", "cold", "warm", "cool", "heat", "rain",
                "sunny", "cloud", "humid", "forecast", "aqi", "air quality", "pollution",
                "polluted", "smog", "climate", "wind", "storm", "kolkata", "calcutta", "howrah",
                "mumbai", "bombay", "bangalore", "bengaluru", "delhi",
            ],
            decline_message: "I'm a specialized weather assistant. I can help with:\n\n\
- **Weather conditions** in Kolkata, Howrah, Mumbai, Bangalore and Delhi\n\
- **Temperature comparisons** between cities\n\
- **Air quality** and pollution levels\n\
- **Forecasts** for today and tomorrow\n\n\
Please ask me about the weather instead!",
        }
    }

    pub fn students() -> Self {
        Self {
            domain: Domain::Students,
            persona: "You are an intelligent student management assistant with read access to the student records database.",
            rules: &[
                "A student named in the query means searchStudentsByName first; use the returned id for follow-up calls.",
                "Marks or performance questions about one student mean getStudentMarks once the student id is known.",
                "Department questions mean searchStudentsByDepartment; class or year questions mean searchStudentsByClass.",
                "Counts and breakdowns mean getStudentStatistics or getTotalStudents.",
                "Questions unrelated to students get needsMoreTools false and a polite decline.",
            ],
            examples: &[
                PromptExample {
                    query: "Show me Vivek's performance",
                    reply: r#"{"needsMoreTools": true, "toolCalls": [{"tool": "searchStudentsByName", "parameters": {"name": "Vivek"}, "reasoning": "Find Vivek's student id before fetching marks"}]}"#,
                },
                PromptExample {
                    query: "Show me students in Computer Science",
                    reply: r#"{"needsMoreTools": true, "toolCalls": [{"tool": "searchStudentsByDepartment", "parameters": {"department": "Computer Science"}, "reasoning": "Department listing"}]}"#,
                },
                PromptExample {
                    query: "Write code in C",
                    reply: r#"{"needsMoreTools": false, "finalResponse": "I can only help with student records: finding students, checking marks and academic statistics."}"#,
                },
            ],
            keywords: &[
                "student", "marks", "grade", "department", "class", "semester", "roll", "name",
                "email", "statistics", "count", "above", "below", "performance", "academic",
                "score", "year",
            ],
            decline_message: "I'm a specialized student management assistant. I can help with:\n\n\
- **Finding students** by name, department, or class year\n\
- **Student marks** and academic performance\n\
- **Student statistics** and counts\n\n\
Please ask me about student information instead!",
        }
    }
}
