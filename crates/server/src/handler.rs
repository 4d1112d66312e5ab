use std::sync::Arc;

use realm::{ClientPacket, Socket, UdpPeerSocket, UserId, World, WorldError};

/// What the connection layer must do after a packet was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    LoggedIn(UserId),
    Disconnect,
}

pub fn handle_packet(
    world: &mut World,
    user: Option<UserId>,
    socket: &Arc<UdpPeerSocket>,
    packet: ClientPacket,
) -> Outcome {
    log::trace!("<- {:?} from {:?}", packet.id(), user);

    match &packet {
        ClientPacket::Disconnect => return Outcome::Disconnect,
        ClientPacket::Login { name } => return login(world, user, socket, name),
        _ => {}
    }

    let Some(user) = user else {
        log::warn!("Dropping {:?} sent before login", packet.id());
        return Outcome::Continue;
    };
    if let Err(e) = dispatch(world, user, packet) {
        log::debug!("Packet from {} ignored: {}", user, e);
    }
    Outcome::Continue
}

fn login(
    world: &mut World,
    user: Option<UserId>,
    socket: &Arc<UdpPeerSocket>,
    name: &str,
) -> Outcome {
    if let Some(id) = user {
        log::warn!("{} sent a second login as `{}`", id, name);
        return Outcome::Continue;
    }

    let conn: Arc<dyn Socket> = socket.clone();
    match world.login(name, conn) {
        Ok(id) => Outcome::LoggedIn(id),
        Err(e) => {
            log::info!("Login as `{}` rejected: {}", name, e);
            Outcome::Continue
        }
    }
}

fn dispatch(world: &mut World, user: UserId, packet: ClientPacket) -> Result<(), WorldError> {
    match packet {
        ClientPacket::Move { direction } => world.move_user(user, direction),
        ClientPacket::Say { text } => world.say(user, &text),
        ClientPacket::Attack { target } => world.attack(user, target).map(drop),
        ClientPacket::StartShopping { shopkeeper } => {
            world.start_shopping(user, shopkeeper).map(drop)
        }
        ClientPacket::BuyFromShop { slot, amount } => {
            world.buy_from_shop(user, slot, amount).map(drop)
        }
        ClientPacket::UseItem { slot } => world.use_item(user, slot).map(drop),
        ClientPacket::Login { .. } | ClientPacket::Disconnect => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realm::{GameSettings, MemoryDb, MoveDirection};

    fn world() -> World {
        World::new(GameSettings::default(), Arc::new(MemoryDb::demo()))
    }

    #[test]
    fn login_then_move() {
        let mut world = world();
        let socket = Arc::new(UdpPeerSocket::new());

        let outcome = handle_packet(
            &mut world,
            None,
            &socket,
            ClientPacket::Login {
                name: "Alice".into(),
            },
        );
        let Outcome::LoggedIn(id) = outcome else {
            panic!("expected login, got {:?}", outcome);
        };
        assert!(socket.queued() > 0);

        let outcome = handle_packet(
            &mut world,
            Some(id),
            &socket,
            ClientPacket::Move {
                direction: MoveDirection::Down,
            },
        );
        assert_eq!(outcome, Outcome::Continue);
    }

    #[test]
    fn gameplay_before_login_is_dropped() {
        let mut world = world();
        let socket = Arc::new(UdpPeerSocket::new());
        let outcome = handle_packet(
            &mut world,
            None,
            &socket,
            ClientPacket::Say {
                text: "hi".into(),
            },
        );
        assert_eq!(outcome, Outcome::Continue);
        assert_eq!(socket.queued(), 0);
    }

    #[test]
    fn disconnect_is_reported() {
        let mut world = world();
        let socket = Arc::new(UdpPeerSocket::new());
        assert_eq!(
            handle_packet(&mut world, None, &socket, ClientPacket::Disconnect),
            Outcome::Disconnect
        );
    }
}
