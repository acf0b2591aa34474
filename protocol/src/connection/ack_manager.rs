use std::collections::VecDeque;

use crate::{
    connection::{
        packet_notifiable::PacketNotifiable, packet_type::PacketType,
        standard_header::StandardHeader,
    },
    constants::RECEIVE_WINDOW,
    types::PacketIndex,
    wrapping_number::wrapping_diff,
};

/// Tracks packet sequence state for one connection: stamps outgoing headers,
/// decides whether incoming packets are fresh, and converts the remote's
/// ack field into delivered/dropped notifications for interested senders.
pub struct AckManager {
    sender_packet_index: PacketIndex,
    newest_remote_packet_index: PacketIndex,
    received_any: bool,
    received_field: u32,
    outstanding: VecDeque<PacketIndex>,
    should_send_empty_ack: bool,
}

impl AckManager {
    pub fn new() -> Self {
        Self {
            sender_packet_index: 0,
            newest_remote_packet_index: 0,
            received_any: false,
            received_field: 0,
            outstanding: VecDeque::new(),
            should_send_empty_ack: false,
        }
    }

    /// The index the next outgoing packet will carry.
    pub fn next_sender_packet_index(&self) -> PacketIndex {
        self.sender_packet_index
    }

    /// Builds the header for the next outgoing packet and advances the
    /// sequence. Only Data packets are tracked for delivery notification;
    /// control packets carry no channel payload.
    pub fn next_outgoing_packet_header(&mut self, packet_type: PacketType) -> StandardHeader {
        let header = StandardHeader::new(
            packet_type,
            self.sender_packet_index,
            self.newest_remote_packet_index,
            self.received_field,
        );
        if packet_type == PacketType::Data {
            self.outstanding.push_back(self.sender_packet_index);
        }
        self.sender_packet_index = self.sender_packet_index.wrapping_add(1);
        self.should_send_empty_ack = false;
        header
    }

    pub fn mark_should_send_empty_ack(&mut self) {
        self.should_send_empty_ack = true;
    }

    pub fn should_send_empty_ack(&self) -> bool {
        self.should_send_empty_ack
    }

    /// Processes an incoming header. Returns `false` when the packet is a
    /// duplicate or too old to accept, in which case the caller must
    /// discard the payload without applying it.
    pub fn process_incoming_header(
        &mut self,
        header: &StandardHeader,
        packet_notifiables: &mut [&mut dyn PacketNotifiable],
    ) -> bool {
        let fresh = self.accept_remote_index(header.sender_packet_index);
        if fresh {
            self.process_remote_acks(
                header.last_remote_packet_index,
                header.ack_field,
                packet_notifiables,
            );
            if header.packet_type == PacketType::Data {
                self.should_send_empty_ack = true;
            }
        }
        fresh
    }

    /// Folds a received sequence number into the local ack state. Fresh
    /// numbers update the field that future outgoing headers will carry.
    fn accept_remote_index(&mut self, remote_index: PacketIndex) -> bool {
        if !self.received_any {
            self.received_any = true;
            self.newest_remote_packet_index = remote_index;
            self.received_field = 0;
            return true;
        }

        let diff = wrapping_diff(self.newest_remote_packet_index, remote_index);
        if diff > 0 {
            let diff = diff as u32;
            self.received_field = if diff >= 32 {
                0
            } else {
                self.received_field << diff
            };
            if diff <= 32 {
                // the previous newest lands diff-1 places behind the new one
                self.received_field |= 1 << (diff - 1);
            }
            self.newest_remote_packet_index = remote_index;
            true
        } else if diff == 0 {
            false
        } else {
            let age = (-diff) as u32 - 1;
            if age >= u32::from(RECEIVE_WINDOW) {
                return false;
            }
            if self.received_field & (1 << age) != 0 {
                return false;
            }
            self.received_field |= 1 << age;
            true
        }
    }

    /// Walks outstanding sent packets against the remote's ack state:
    /// acknowledged ones are delivered, ones that fell out of the 32-wide
    /// window are dropped.
    fn process_remote_acks(
        &mut self,
        remote_ack: PacketIndex,
        ack_field: u32,
        packet_notifiables: &mut [&mut dyn PacketNotifiable],
    ) {
        let mut position = 0;
        while position < self.outstanding.len() {
            let sent_index = self.outstanding[position];
            let diff = wrapping_diff(sent_index, remote_ack);
            if diff < 0 {
                // this entry and everything after it is newer than the ack
                break;
            }

            let delivered = diff == 0
                || (diff as u32 <= 32 && ack_field & (1 << (diff as u32 - 1)) != 0);

            if delivered {
                self.outstanding.remove(position);
                for notifiable in packet_notifiables.iter_mut() {
                    notifiable.notify_packet_delivered(sent_index);
                }
            } else if diff as u32 > 32 {
                self.outstanding.remove(position);
                for notifiable in packet_notifiables.iter_mut() {
                    notifiable.notify_packet_dropped(sent_index);
                }
            } else {
                // inside the window but unacked: it may yet be confirmed by
                // a later header, keep waiting
                position += 1;
            }
        }
    }
}
