//! Interactive chat REPL over the search agent.
//!
//! Slash commands are handled locally; anything else becomes a search
//! turn. History is held in memory for the session only.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::agent::SearchAgent;
use crate::models::ConversationTurn;
use crate::stats;

const BANNER: &str = "operius chat — ask about your synced repos and cluster.\n\
Type /help for commands, /quit to exit.";

const HELP: &str = "Commands:\n\
  /help      show this help\n\
  /stats     collection statistics\n\
  /demo      run a few example queries\n\
  /history   queries asked this session\n\
  /clear     forget session history\n\
  /quit      exit (also /exit)";

const DEMO_QUERIES: &[&str] = &[
    "what pods are running?",
    "where is the main function defined?",
    "show recent commits",
];

pub struct ChatSession {
    agent: SearchAgent,
    history: Vec<ConversationTurn>,
}

impl ChatSession {
    pub fn new(agent: SearchAgent) -> Self {
        Self {
            agent,
            history: Vec::new(),
        }
    }

    /// Run the REPL until `/quit` or EOF.
    pub async fn run(&mut self) -> Result<()> {
        println!("{}\n", BANNER);

        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();
        let mut stdout = tokio::io::stdout();

        loop {
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;

            let line = match lines.next_line().await? {
                Some(line) => line,
                None => break, // EOF
            };
            let input = line.trim();
            if input.is_empty() {
                continue;
            }

            if input.starts_with('/') {
                if !self.handle_command(input).await? {
                    break;
                }
                continue;
            }

            self.ask(input).await?;
        }

        println!("Bye.");
        Ok(())
    }

    /// Returns false when the session should end.
    async fn handle_command(&mut self, input: &str) -> Result<bool> {
        match input {
            "/help" => println!("{}", HELP),
            "/quit" | "/exit" => return Ok(false),
            "/stats" => {
                let collected = stats::collect(self.agent.store().pool()).await?;
                println!("{}", stats::render(&collected));
            }
            "/history" => {
                if self.history.is_empty() {
                    println!("No queries yet.");
                } else {
                    for (i, turn) in self.history.iter().enumerate() {
                        println!(
                            "{}. [{}] {}{}",
                            i + 1,
                            turn.intent,
                            turn.query,
                            if turn.degraded { " (degraded)" } else { "" },
                        );
                    }
                }
            }
            "/clear" => {
                self.history.clear();
                println!("History cleared.");
            }
            "/demo" => {
                for query in DEMO_QUERIES {
                    println!("demo> {}", query);
                    self.ask(query).await?;
                }
            }
            other => println!("Unknown command: {}. Type /help.", other),
        }
        Ok(true)
    }

    async fn ask(&mut self, query: &str) -> Result<()> {
        let turn = self.agent.answer(query, &self.history).await?;
        println!("[intent: {}]", turn.intent);
        if turn.degraded {
            println!("(assistant unavailable, showing raw results)");
        }
        println!("{}\n", turn.response_text);
        self.history.push(turn);
        Ok(())
    }
}
