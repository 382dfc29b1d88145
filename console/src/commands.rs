use std::sync::Arc;

use arbor_core::{
    api::{AuthClient, HierarchyApi, HierarchyClient},
    auth::{AuthError, AuthFormController, LoginForm, SignupForm},
    config::Config,
    model::AssetId,
    notify::{format_average, spawn_hub, HubKind, NotificationRelay, Notifier, SseTransport, Toast},
    session::{FileSessionStore, SessionStore},
    tree::{detail, Confirm, FixedAnswer, MemoryTree, NodeKey, Outcome, TreeController, TreeError, TreeWidget},
};
use color_eyre::eyre::{bail, eyre, Context, Result};
use tokio::sync::mpsc;

use crate::{
    cli::Command,
    terminal::{PrintBoard, PrintNavigator, StdinConfirm, TerminalNotifier},
};

type Controller = TreeController<MemoryTree, HierarchyClient>;

/// Label segments of an asset path; empty for the top level.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Expands along `path` and returns the node it names.
async fn locate(ctl: &mut Controller, path: &str) -> Result<NodeKey> {
    let mut key = NodeKey::root();
    for label in split_path(path) {
        ctl.expand(&key).await?;
        key = ctl
            .widget()
            .find_by_label(&key, label)
            .ok_or_else(|| eyre!("No asset named {:?} on the way to {:?}", label, path))?;
    }
    Ok(key)
}

fn settle(results: Vec<Result<Outcome, TreeError>>) -> Result<()> {
    for result in results {
        let outcome = result?;
        tracing::debug!(?outcome, "tree event handled");
    }
    Ok(())
}

fn auth_result<T>(result: Result<T, AuthError>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(AuthError::Invalid(errors)) => {
            for error in errors.iter() {
                eprintln!("{}: {}", error.field, error.message);
            }
            bail!("The form has invalid fields")
        }
        Err(err) => Err(err.into()),
    }
}

pub struct App {
    config: Config,
    session: Arc<FileSessionStore>,
    notifier: Arc<TerminalNotifier>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let session = FileSessionStore::open(config.session_path.clone())
            .wrap_err("Error opening session store")?;
        Ok(App {
            config,
            session: Arc::new(session),
            notifier: Arc::new(TerminalNotifier),
        })
    }

    fn session(&self) -> Arc<dyn SessionStore> {
        self.session.clone()
    }

    fn hierarchy(&self) -> Result<HierarchyClient> {
        if self.session.token().is_none() {
            tracing::warn!("not logged in, requests are sent without a token");
        }
        HierarchyClient::new(
            &self.config.api.base_url,
            self.session(),
            self.config.api.timeout,
        )
        .wrap_err("Error building HTTP client")
    }

    fn controller(&self, confirm: Box<dyn Confirm>) -> Result<Controller> {
        Ok(TreeController::new(
            MemoryTree::default(),
            Arc::new(self.hierarchy()?),
            self.notifier.clone(),
            confirm,
        ))
    }

    fn auth(&self) -> Result<AuthFormController<AuthClient>> {
        let client = AuthClient::new(&self.config.api.base_url, self.config.api.timeout)
            .wrap_err("Error building HTTP client")?;
        Ok(AuthFormController::new(
            client,
            self.session(),
            self.notifier.clone(),
            Arc::new(PrintNavigator),
            self.config.auth.clone(),
        ))
    }

    #[tracing::instrument(skip_all)]
    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Login { email, password } => {
                let form = LoginForm { email, password };
                auth_result(self.auth()?.login(&form).await)?;
            }
            Command::Register {
                name,
                email,
                password,
                role,
            } => {
                let form = SignupForm {
                    name,
                    email,
                    password,
                    role,
                };
                auth_result(self.auth()?.signup(&form).await)?;
            }
            Command::Logout => auth_result(self.auth()?.logout())?,
            Command::Whoami => match self.session.load() {
                Some(session) => println!(
                    "{} <{}>, role {}, signed in {}{}",
                    session.profile.name,
                    session.profile.email,
                    session.profile.role,
                    session.issued_at.format("%Y-%m-%d %H:%M"),
                    if session.token.is_some() { "" } else { " (no token)" }
                ),
                None => println!("Not logged in"),
            },
            Command::Tree { depth, full } => self.print_tree(depth, full).await?,
            Command::Add { parent, name } => {
                let mut ctl = self.controller(Box::new(FixedAnswer(true)))?;
                let parent = locate(&mut ctl, &parent).await?;
                let node = ctl.begin_create(&parent, "New node");
                ctl.widget_mut().user_commit_edit(&node, &name);
                settle(ctl.pump().await)?;
            }
            Command::Rename { path, name } => {
                let mut ctl = self.controller(Box::new(FixedAnswer(true)))?;
                let node = locate(&mut ctl, &path).await?;
                if node.is_root() {
                    bail!("The top level cannot be renamed");
                }
                ctl.widget_mut().begin_edit(&node);
                ctl.widget_mut().user_commit_edit(&node, &name);
                settle(ctl.pump().await)?;
            }
            Command::Mv { path, new_parent } => {
                let mut ctl = self.controller(Box::new(FixedAnswer(true)))?;
                let node = locate(&mut ctl, &path).await?;
                let target = locate(&mut ctl, &new_parent).await?;
                ctl.widget_mut().user_drag(&node, &target, usize::MAX);
                settle(ctl.pump().await)?;
            }
            Command::MoveId { id, new_parent } => {
                let reply = self
                    .hierarchy()?
                    .move_asset(AssetId(id), new_parent.map(AssetId))
                    .await?;
                self.notifier.notify(Toast::success(
                    "Asset moved",
                    reply
                        .message
                        .unwrap_or_else(|| format!("Asset #{} was moved.", id)),
                ));
            }
            Command::Rm { path, yes } => {
                let confirm: Box<dyn Confirm> = if yes {
                    Box::new(FixedAnswer(true))
                } else {
                    Box::new(StdinConfirm)
                };
                let mut ctl = self.controller(confirm)?;
                let node = locate(&mut ctl, &path).await?;
                ctl.widget_mut().user_delete(&node);
                settle(ctl.pump().await)?;
            }
            Command::Deleted => {
                let mut ctl = self.controller(Box::new(FixedAnswer(false)))?;
                ctl.load_deleted().await?;
                self.print_deleted(&ctl);
            }
            Command::Restore { id } => {
                let mut ctl = self.controller(Box::new(FixedAnswer(false)))?;
                ctl.restore(AssetId(id)).await?;
                self.print_deleted(&ctl);
            }
            Command::Combinations => match self.hierarchy()?.combinations_count().await? {
                Some(count) => println!("{} combinations", count),
                None => println!("The server did not report a count"),
            },
            Command::Average { column } => {
                let reply = self.hierarchy()?.average(&column).await?;
                match (reply.average, reply.message) {
                    (Some(average), _) => println!(
                        "{}: {}",
                        reply.column.as_deref().unwrap_or(&column),
                        format_average(Some(average))
                    ),
                    (None, Some(message)) => println!("{}", message),
                    (None, None) => println!("{}: {}", column, format_average(None)),
                }
            }
            Command::Watch { columns } => self.watch(&columns).await?,
        }
        Ok(())
    }

    async fn print_tree(&self, depth: usize, full: bool) -> Result<()> {
        let mut ctl = self.controller(Box::new(FixedAnswer(false)))?;
        if full {
            ctl.load_hierarchy().await?;
        } else {
            let mut frontier = vec![NodeKey::root()];
            for _ in 0..depth {
                let mut next = Vec::new();
                for key in frontier {
                    ctl.expand(&key).await?;
                    next.extend(ctl.widget().children(&key));
                }
                frontier = next;
            }
        }
        print!("{}", ctl.widget().render());
        Ok(())
    }

    fn print_deleted(&self, ctl: &Controller) {
        let items = ctl.deleted_view().items();
        if items.is_empty() {
            println!("No deleted assets");
        }
        for item in items {
            for line in detail(item).lines() {
                println!("{}", line);
            }
        }
    }

    /// Connects both hubs and relays their events until Ctrl-C.
    async fn watch(&self, columns: &[String]) -> Result<()> {
        let (send, recv) = mpsc::unbounded_channel();
        let mut hubs = Vec::new();
        for hub in [HubKind::Structure, HubKind::Average] {
            let url = self.config.hub_url(hub);
            tracing::info!(%hub, %url, "subscribing");
            let transport = SseTransport::build(url, self.session())
                .wrap_err("Error building HTTP client")?;
            hubs.push(spawn_hub(
                hub,
                transport,
                self.config.hub_options(),
                send.clone(),
            ));
        }
        drop(send);

        let board = PrintBoard::with_columns(columns.iter().map(String::as_str));
        let relay = NotificationRelay::new(
            self.notifier.clone(),
            board,
            self.config.notifications.throttle,
        );
        let relay = tokio::task::spawn(relay.run(recv));

        tokio::signal::ctrl_c()
            .await
            .wrap_err("Error waiting for Ctrl-C")?;
        tracing::info!("shutting down");
        for hub in hubs {
            hub.shutdown().await;
        }
        relay.await.wrap_err("Relay task failed")?;
        Ok(())
    }
}
