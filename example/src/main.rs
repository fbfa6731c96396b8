use anyhow::Result;
use crossbeam::channel;
use std::time::Duration;

use reactrt::prelude::*;

const ROUNDS: u64 = 10;

/// Ball carried between the two reactors: the round counter plus the
/// channel to hit it back on.
#[derive(Clone)]
struct Ball {
    round: u64,
    reply: Channel<Ball>,
}

struct Player;

impl Reactor for Player {
    type Event = Ball;

    fn init(_scope: &ReactorScope<Ball>) -> Result<Self> {
        Ok(Player)
    }
}

fn main() -> Result<()> {
    let _log_guard = LoggerConfig::from_env().init()?;

    let system = ReactorSystem::new("ping-pong", SystemConfig::default());
    system.install_termination_signals()?;

    let (done_tx, done_rx) = channel::bounded::<()>(1);

    // Pong returns every ball until the rally ends.
    let pong = system
        .spawn(
            Proto::<Player>::from_fn(|scope| {
                let me = scope.channel();
                scope.main().events().subscribe(move |ball: &Ball| {
                    tracing::info!("[pong] round {}", ball.round);
                    ball.reply.send(Ball {
                        round: ball.round,
                        reply: me.clone(),
                    });
                });
                Ok(Player)
            })
            .with_name("pong"),
        )
        .expect("spawn pong");

    // Ping serves, counts rounds, and seals itself once done.
    system
        .spawn(
            Proto::<Player>::from_fn(move |scope| {
                let me = scope.channel();
                let main = scope.main().clone();
                scope.main().events().subscribe(move |ball: &Ball| {
                    tracing::info!("[ping] round {}", ball.round);
                    if ball.round >= ROUNDS {
                        main.seal();
                        done_tx.send(()).ok();
                    } else {
                        ball.reply.send(Ball {
                            round: ball.round + 1,
                            reply: me.clone(),
                        });
                    }
                });
                // Serve the first ball to ourselves via pong.
                pong.send(Ball {
                    round: 1,
                    reply: scope.channel(),
                });
                Ok(Player)
            })
            .with_name("ping"),
        )
        .expect("spawn ping");

    done_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("rally did not finish");
    system.shutdown();
    Ok(())
}
